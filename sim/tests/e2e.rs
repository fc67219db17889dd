//! Designs that go through the whole lowering pipeline and are then
//! simulated.
use strobe_ir::{
    self as ir, BinOp, BoolAttr, ConstraintItem, Constraint, Direction, Edge,
    Expr, JoinType, Module, ModuleKind, Process, ProcessKind, Query, RRC,
    SenItem, Stmt, SyncOp, VarType, Variable,
};
use strobe_sim::runtime::status;
use strobe_sim::{RuntimeConfig, SimError, Simulator};

fn design() -> Module {
    Module::new("top", ModuleKind::Design)
}

fn simulate(modules: Vec<Module>, config: RuntimeConfig) -> Simulator {
    Simulator::compile(ir::Context::new(modules, "top"), config).unwrap()
}

fn c(value: u64, width: u64) -> Expr {
    Expr::constant(value, width)
}

fn delay(amount: u64) -> Stmt {
    Stmt::delay(c(amount, 32))
}

fn incr(v: &RRC<Variable>) -> Stmt {
    let w = v.borrow().width();
    Stmt::assign(
        Expr::var(v),
        Expr::binary(BinOp::Add, Expr::var(v), c(1, w)),
    )
}

fn initial(top: &mut Module, name: &str, body: Vec<Stmt>) {
    top.add_process(Process::new(name, ProcessKind::Initial, Stmt::seq(body)));
}

#[test]
fn counter_clocked_from_outside() {
    let mut top = design();
    let clk = top.add_var(Variable::logic("clk", 1).with_direction(Direction::Input));
    let cnt = top.add_var(Variable::logic("cnt", 8));
    let next = top.add_var(Variable::logic("next", 8));
    top.add_process(Process::new(
        "count",
        ProcessKind::Always(Some(vec![SenItem::new(Edge::Pos, Expr::var(&clk))])),
        Stmt::nba(
            Expr::var(&cnt),
            Expr::binary(BinOp::Add, Expr::var(&cnt), c(1, 8)),
        ),
    ));
    top.add_process(Process::new(
        "peek",
        ProcessKind::Continuous,
        Stmt::assign(
            Expr::var(&next),
            Expr::binary(BinOp::Add, Expr::var(&cnt), c(1, 8)),
        ),
    ));

    let mut sim = simulate(vec![top], RuntimeConfig::default());
    sim.eval().unwrap();
    assert_eq!(sim.get("next").unwrap(), 1);
    for _ in 0..3 {
        sim.set("clk", 1).unwrap();
        sim.eval().unwrap();
        sim.set("clk", 0).unwrap();
        sim.eval().unwrap();
    }
    assert_eq!(sim.get("cnt").unwrap(), 3);
    assert_eq!(sim.get("next").unwrap(), 4);
    // Nothing waits for time to pass.
    assert!(!sim.step().unwrap());
}

#[test]
fn generated_clock_drives_static_logic() {
    let mut top = design();
    let clk = top.add_var(Variable::logic("clk", 1));
    let cnt = top.add_var(Variable::logic("cnt", 8));
    initial(
        &mut top,
        "clkgen",
        vec![Stmt::forever(Stmt::seq(vec![
            delay(5),
            Stmt::assign(Expr::var(&clk), Expr::not(Expr::var(&clk))),
        ]))],
    );
    top.add_process(Process::new(
        "count",
        ProcessKind::Always(Some(vec![SenItem::new(Edge::Pos, Expr::var(&clk))])),
        Stmt::nba(
            Expr::var(&cnt),
            Expr::binary(BinOp::Add, Expr::var(&cnt), c(1, 8)),
        ),
    ));
    initial(&mut top, "stop", vec![delay(52), Stmt::finish()]);

    let mut sim = simulate(vec![top], RuntimeConfig::default());
    let end = sim.run().unwrap();
    assert!(sim.is_finished());
    assert_eq!(end, 52);
    // Rising edges at 5, 15, 25, 35, and 45.
    assert_eq!(sim.get("cnt").unwrap(), 5);
}

/// `fork #10 a = 1; #5 b = 1; <join>; snap = a;`
fn fork_design(join: JoinType) -> Module {
    let mut top = design();
    let a = top.add_var(Variable::logic("a", 1));
    let b = top.add_var(Variable::logic("b", 1));
    let snap = top.add_var(Variable::logic("snap", 1).with_init(1));
    let snap_b = top.add_var(Variable::logic("snap_b", 1));
    initial(
        &mut top,
        "main",
        vec![
            Stmt::fork(
                vec![
                    Stmt::seq(vec![delay(10), Stmt::assign(Expr::var(&a), Expr::one())]),
                    Stmt::seq(vec![delay(5), Stmt::assign(Expr::var(&b), Expr::one())]),
                ],
                join,
            ),
            Stmt::assign(Expr::var(&snap), Expr::var(&a)),
            Stmt::assign(Expr::var(&snap_b), Expr::var(&b)),
        ],
    );
    top
}

#[test]
fn join_waits_for_every_branch() {
    let mut sim = simulate(vec![fork_design(JoinType::All)], RuntimeConfig::default());
    sim.run().unwrap();
    assert_eq!(sim.get("snap").unwrap(), 1);
    assert_eq!(sim.get("snap_b").unwrap(), 1);
}

#[test]
fn join_any_resumes_after_the_first_branch() {
    let mut sim = simulate(vec![fork_design(JoinType::Any)], RuntimeConfig::default());
    sim.run().unwrap();
    assert_eq!(sim.get("snap").unwrap(), 0);
    assert_eq!(sim.get("snap_b").unwrap(), 1);
    // The slower branch still completes.
    assert_eq!(sim.get("a").unwrap(), 1);
}

#[test]
fn join_none_does_not_block() {
    let mut sim = simulate(vec![fork_design(JoinType::None)], RuntimeConfig::default());
    sim.run().unwrap();
    assert_eq!(sim.get("snap").unwrap(), 0);
    assert_eq!(sim.get("snap_b").unwrap(), 0);
    assert_eq!(sim.get("a").unwrap(), 1);
    assert_eq!(sim.get("b").unwrap(), 1);
}

#[test]
fn wait_blocks_until_the_condition_holds() {
    let mut top = design();
    let go = top.add_var(Variable::logic("go", 1));
    let seen = top.add_var(Variable::logic("seen", 1));
    initial(
        &mut top,
        "waiter",
        vec![Stmt::wait(
            Expr::var(&go),
            Stmt::assign(Expr::var(&seen), Expr::one()),
        )],
    );
    initial(
        &mut top,
        "driver",
        vec![delay(3), Stmt::assign(Expr::var(&go), Expr::one())],
    );

    let mut sim = simulate(vec![top], RuntimeConfig::default());
    sim.eval().unwrap();
    assert_eq!(sim.get("seen").unwrap(), 0);
    assert!(sim.step().unwrap());
    assert_eq!(sim.time(), 3);
    assert_eq!(sim.get("seen").unwrap(), 1);
}

#[test]
fn delayed_nonblocking_assignment_samples_early() {
    let mut top = design();
    let a = top.add_var(Variable::logic("a", 4));
    let b = top.add_var(Variable::logic("b", 4));
    let snap = top.add_var(Variable::logic("snap", 4));
    initial(
        &mut top,
        "main",
        vec![
            Stmt::assign(Expr::var(&b), c(3, 4)),
            Stmt::delayed_assign(
                Expr::var(&a),
                Expr::var(&b),
                ir::AssignKind::NonBlocking,
                c(5, 32),
            ),
            Stmt::assign(Expr::var(&b), c(7, 4)),
            delay(10),
            Stmt::assign(Expr::var(&snap), Expr::var(&a)),
        ],
    );
    let mut sim = simulate(vec![top], RuntimeConfig::default());
    sim.run().unwrap();
    assert_eq!(sim.get("snap").unwrap(), 3);
    assert_eq!(sim.get("b").unwrap(), 7);
}

#[test]
fn force_and_release() {
    let mut top = design();
    let x = top.add_var(Variable::logic("x", 4));
    let y = top.add_var(Variable::logic("y", 4));
    let z = top.add_var(Variable::logic("z", 4));
    let w = top.add_var(Variable::logic("w", 4));
    initial(
        &mut top,
        "main",
        vec![
            Stmt::assign(Expr::var(&x), c(0, 4)),
            Stmt::force(Expr::var(&x), c(0xa, 4)),
            delay(1),
            Stmt::force(Expr::slice(Expr::var(&x), 0, 2), c(0b01, 2)),
            delay(1),
            Stmt::assign(Expr::var(&y), Expr::var(&x)),
            delay(1),
            Stmt::release(Expr::var(&x)),
            Stmt::assign(Expr::var(&z), Expr::var(&x)),
            Stmt::assign(Expr::var(&x), c(3, 4)),
            Stmt::assign(Expr::var(&w), Expr::var(&x)),
        ],
    );
    let mut sim = simulate(vec![top], RuntimeConfig::default());
    sim.run().unwrap();
    // 4'b1010 with the low two bits forced to 2'b01.
    assert_eq!(sim.get("y").unwrap(), 0b1001);
    // Release keeps the forced value until the next write.
    assert_eq!(sim.get("z").unwrap(), 0b1001);
    assert_eq!(sim.get("w").unwrap(), 3);
}

#[test]
fn second_release_changes_nothing() {
    let mut top = design();
    let x = top.add_var(Variable::logic("x", 4));
    let y = top.add_var(Variable::logic("y", 4));
    initial(
        &mut top,
        "main",
        vec![
            Stmt::assign(Expr::var(&x), c(1, 4)),
            Stmt::force(Expr::var(&x), c(6, 4)),
            delay(1),
            Stmt::release(Expr::var(&x)),
            Stmt::assign(Expr::var(&y), Expr::var(&x)),
            delay(1),
            Stmt::release(Expr::var(&x)),
        ],
    );
    let mut sim = simulate(vec![top], RuntimeConfig::default());
    sim.run().unwrap();
    assert_eq!(sim.get("y").unwrap(), 6);
    assert_eq!(sim.get("x").unwrap(), 6);
    assert_eq!(sim.get("__VforceEn0__x").unwrap(), 0);
    assert_eq!(sim.get("__VforceRhs0__x").unwrap(), 6);
}

#[test]
fn forced_clock_drives_edges() {
    let mut top = design();
    let clk = top.add_var(Variable::logic("clk", 1));
    let cnt = top.add_var(Variable::logic("cnt", 4));
    let seen = top.add_var(Variable::logic("seen", 1));
    top.add_process(Process::new(
        "ff",
        ProcessKind::Always(Some(vec![SenItem::new(Edge::Pos, Expr::var(&clk))])),
        Stmt::nba(
            Expr::var(&cnt),
            Expr::binary(BinOp::Add, Expr::var(&cnt), c(1, 4)),
        ),
    ));
    initial(
        &mut top,
        "waiter",
        vec![Stmt::timing(
            vec![SenItem::new(Edge::Pos, Expr::var(&clk))],
            Stmt::assign(Expr::var(&seen), Expr::one()),
        )],
    );
    initial(
        &mut top,
        "main",
        vec![
            Stmt::assign(Expr::var(&clk), c(0, 1)),
            delay(1),
            Stmt::force(Expr::var(&clk), c(1, 1)),
            delay(1),
        ],
    );
    let mut sim = simulate(vec![top], RuntimeConfig::default());
    sim.run().unwrap();
    assert_eq!(sim.get("cnt").unwrap(), 1);
    assert_eq!(sim.get("seen").unwrap(), 1);
}

#[test]
fn combinational_loop_hits_the_iteration_limit() {
    let mut top = design();
    let a = top.add_var(Variable::logic("a", 1));
    let b = top.add_var(Variable::logic("b", 1));
    top.add_process(Process::new(
        "inv",
        ProcessKind::Continuous,
        Stmt::assign(Expr::var(&a), Expr::not(Expr::var(&b))),
    ));
    top.add_process(Process::new(
        "buf",
        ProcessKind::Continuous,
        Stmt::assign(Expr::var(&b), Expr::var(&a)),
    ));
    let config = RuntimeConfig::builder().converge_limit(5).build();
    let mut sim = simulate(vec![top], config);
    let err = sim.eval().unwrap_err();
    match err.into_inner() {
        SimError::ConvergenceLimit {
            region,
            iterations,
            triggers,
        } => {
            assert_eq!(region, ir::RegionKind::Stl);
            assert_eq!(iterations, 5);
            assert!(!triggers.is_empty());
        }
        e => panic!("unexpected error: {e}"),
    }
}

#[test]
fn semaphore_serializes_holders() {
    let mut top = design();
    let sem = top.add_var(Variable::new("sem", VarType::Semaphore).with_init(1));
    let a_done = top.add_var(Variable::logic("a_done", 1));
    let b_saw = top.add_var(Variable::logic("b_saw", 1));
    let c_try = top.add_var(Variable::logic("c_try", 1).with_init(1));
    let get = || {
        Stmt::sync(SyncOp::SemGet {
            sem: Expr::var(&sem),
            keys: c(1, 32),
        })
    };
    let put = || {
        Stmt::sync(SyncOp::SemPut {
            sem: Expr::var(&sem),
            keys: c(1, 32),
        })
    };
    initial(
        &mut top,
        "a",
        vec![
            get(),
            delay(10),
            Stmt::assign(Expr::var(&a_done), Expr::one()),
            put(),
        ],
    );
    initial(
        &mut top,
        "b",
        vec![
            delay(1),
            get(),
            Stmt::assign(Expr::var(&b_saw), Expr::var(&a_done)),
            put(),
        ],
    );
    initial(
        &mut top,
        "c",
        vec![
            delay(2),
            Stmt::assign(
                Expr::var(&c_try),
                Expr::Query(Query::SemTryGet {
                    sem: Box::new(Expr::var(&sem)),
                    keys: Box::new(c(1, 32)),
                }),
            ),
        ],
    );
    let config = RuntimeConfig::builder().max_time(100).build();
    let mut sim = simulate(vec![top], config);
    assert_eq!(sim.run().unwrap(), 10);
    assert_eq!(sim.get("b_saw").unwrap(), 1);
    assert_eq!(sim.get("c_try").unwrap(), 0);
}

#[test]
fn killed_processes_stop_and_release_awaiters() {
    let mut top = design();
    let h = top.add_var(Variable::new("h", VarType::Process));
    let cnt = top.add_var(Variable::logic("cnt", 8));
    let st = top.add_var(Variable::logic("st", 32));
    let done = top.add_var(Variable::logic("done", 1));
    initial(
        &mut top,
        "worker",
        vec![
            Stmt::sync(SyncOp::ProcSelf {
                target: Expr::var(&h),
            }),
            Stmt::forever(Stmt::seq(vec![delay(1), incr(&cnt)])),
        ],
    );
    initial(
        &mut top,
        "killer",
        vec![
            delay(5),
            Stmt::sync(SyncOp::ProcKill(Expr::var(&h))),
            Stmt::assign(
                Expr::var(&st),
                Expr::Query(Query::ProcStatus(Box::new(Expr::var(&h)))),
            ),
        ],
    );
    initial(
        &mut top,
        "watcher",
        vec![
            Stmt::sync(SyncOp::ProcAwait(Expr::var(&h))),
            Stmt::assign(Expr::var(&done), Expr::one()),
        ],
    );
    let mut sim = simulate(vec![top], RuntimeConfig::default());
    sim.run().unwrap();
    assert_eq!(sim.time(), 5);
    assert_eq!(sim.get("cnt").unwrap(), 4);
    assert_eq!(sim.get("st").unwrap(), status::KILLED);
    assert_eq!(sim.get("done").unwrap(), 1);
    let handle = sim.get("h").unwrap();
    assert_eq!(sim.machine().process_status(handle), Some(status::KILLED));
}

#[test]
fn randomize_respects_hard_constraints() {
    let mut class = Module::new("Packet", ModuleKind::Class { extends: None });
    let x = class.add_var(Variable::logic("x", 8).with_attr(BoolAttr::Rand));
    class.constraints.push(Constraint {
        name: "small".into(),
        items: vec![
            ConstraintItem {
                cond: Expr::binary(BinOp::Lt, Expr::var(&x), c(128, 8)),
                soft: false,
            },
            // Contradicts the hard constraint and gets dropped.
            ConstraintItem {
                cond: Expr::binary(BinOp::Gt, Expr::var(&x), c(200, 8)),
                soft: true,
            },
        ],
    });

    let mut top = design();
    let p = top.add_var(Variable::new("p", VarType::Class("Packet".into())));
    let ok = top.add_var(Variable::logic("ok", 1));
    let val = top.add_var(Variable::logic("val", 8));
    let mut call = Stmt::method_call(Expr::var(&p), "randomize", vec![]);
    if let Stmt::Call(call) = &mut call {
        call.ret = Some(Expr::var(&ok));
    }
    initial(
        &mut top,
        "main",
        vec![
            Stmt::assign(Expr::var(&p), Expr::New("Packet".into())),
            call,
            Stmt::assign(Expr::var(&val), Expr::member(Expr::var(&p), &x)),
        ],
    );

    let config = RuntimeConfig::builder().seed(42).build();
    let mut sim = simulate(vec![top, class], config);
    sim.run().unwrap();
    assert_eq!(sim.get("ok").unwrap(), 1);
    assert!(sim.get("val").unwrap() < 128);
}

#[test]
fn final_blocks_run_on_request() {
    let mut top = design();
    let x = top.add_var(Variable::logic("x", 4));
    top.add_process(Process::new(
        "bye",
        ProcessKind::Final,
        Stmt::assign(Expr::var(&x), c(9, 4)),
    ));
    let mut sim = simulate(vec![top], RuntimeConfig::default());
    sim.run().unwrap();
    assert_eq!(sim.get("x").unwrap(), 0);
    sim.finish().unwrap();
    assert_eq!(sim.get("x").unwrap(), 9);
}

#[test]
fn unscheduled_designs_are_rejected() {
    let ctx = ir::Context::new(vec![design()], "top");
    let Err(err) = Simulator::new(&ctx, RuntimeConfig::default()) else {
        panic!("an unlowered design was accepted");
    };
    assert!(matches!(*err, SimError::Unscheduled(_)));
}

#[test]
fn nonblocking_member_writes_fire_edge_events() {
    let mut class = Module::new("C", ModuleKind::Class { extends: None });
    let flag = class.add_var(Variable::logic("flag", 1));

    let mut top = design();
    let obj = top.add_var(Variable::new("obj", VarType::Class("C".into())));
    let seen = top.add_var(Variable::logic("seen", 1));
    let member = || Expr::member(Expr::var(&obj), &flag);
    initial(
        &mut top,
        "main",
        vec![
            Stmt::assign(Expr::var(&obj), Expr::New("C".into())),
            Stmt::fork(
                vec![
                    Stmt::timing(
                        vec![SenItem::new(Edge::Pos, member())],
                        Stmt::assign(Expr::var(&seen), Expr::one()),
                    ),
                    Stmt::seq(vec![delay(1), Stmt::nba(member(), Expr::one())]),
                ],
                JoinType::None,
            ),
            delay(5),
        ],
    );

    let mut sim = simulate(vec![top, class], RuntimeConfig::default());
    sim.run().unwrap();
    assert_eq!(sim.get("seen").unwrap(), 1);
}
