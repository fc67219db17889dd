//! Designs the driver can compile without a front end.
use crate::cmdline::Design;
use strobe_ir::{
    self as ir, BinOp, BoolAttr, Constraint, ConstraintItem, Edge, Expr,
    JoinType, Module, ModuleKind, Process, ProcessKind, Query, SenItem, Stmt,
    SyncOp, VarType, Variable, RRC,
};

fn c(value: u64, width: u64) -> Expr {
    Expr::constant(value, width)
}

fn delay(amount: u64) -> Stmt {
    Stmt::delay(c(amount, 32))
}

fn add(v: &RRC<Variable>, amount: u64) -> Expr {
    let width = v.borrow().width();
    Expr::binary(BinOp::Add, Expr::var(v), c(amount, width))
}

fn initial(top: &mut Module, name: &str, body: Vec<Stmt>) {
    top.add_process(Process::new(name, ProcessKind::Initial, Stmt::seq(body)));
}

/// ```text
/// initial forever #5 clk = ~clk;
/// always @(posedge clk) cnt <= cnt + 1;
/// assign next = cnt + 1;
/// initial #100 $finish;
/// ```
fn counter() -> Vec<Module> {
    let mut top = Module::new("top", ModuleKind::Design);
    let clk = top.add_var(Variable::logic("clk", 1));
    let cnt = top.add_var(Variable::logic("cnt", 8));
    let next = top.add_var(Variable::logic("next", 8));
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
        Stmt::nba(Expr::var(&cnt), add(&cnt, 1)),
    ));
    top.add_process(Process::new(
        "peek",
        ProcessKind::Continuous,
        Stmt::assign(Expr::var(&next), add(&cnt, 1)),
    ));
    initial(&mut top, "stop", vec![delay(100), Stmt::finish()]);
    vec![top]
}

/// Two forks over the same branches, one waiting for all of them and one
/// for the first.
fn fork_join() -> Vec<Module> {
    let mut top = Module::new("top", ModuleKind::Design);
    let a = top.add_var(Variable::logic("a", 4));
    let b = top.add_var(Variable::logic("b", 4));
    let all = top.add_var(Variable::logic("after_all", 4));
    let any = top.add_var(Variable::logic("after_any", 4));
    let branches = |base: u64| {
        vec![
            Stmt::seq(vec![delay(base + 10), Stmt::assign(Expr::var(&a), add(&a, 1))]),
            Stmt::seq(vec![delay(base + 5), Stmt::assign(Expr::var(&b), add(&b, 1))]),
        ]
    };
    initial(
        &mut top,
        "main",
        vec![
            Stmt::fork(branches(0), JoinType::All),
            Stmt::assign(
                Expr::var(&all),
                Expr::binary(BinOp::Add, Expr::var(&a), Expr::var(&b)),
            ),
            Stmt::fork(branches(20), JoinType::Any),
            Stmt::assign(
                Expr::var(&any),
                Expr::binary(BinOp::Add, Expr::var(&a), Expr::var(&b)),
            ),
            // Intra-assignment delay: the value of `b` is taken now.
            Stmt::delayed_assign(
                Expr::var(&a),
                Expr::var(&b),
                ir::AssignKind::NonBlocking,
                c(10, 32),
            ),
            Stmt::assign(Expr::var(&b), c(0, 4)),
        ],
    );
    vec![top]
}

/// ```text
/// force x = 8'hf0; #1 force x[3:0] = 4'h5; #1 y = x;
/// #1 release x; z = x;
/// ```
fn force() -> Vec<Module> {
    let mut top = Module::new("top", ModuleKind::Design);
    let x = top.add_var(Variable::logic("x", 8).with_init(0x0c));
    let y = top.add_var(Variable::logic("y", 8));
    let z = top.add_var(Variable::logic("z", 8));
    let sum = top.add_var(Variable::logic("sum", 8));
    top.add_process(Process::new(
        "observe",
        ProcessKind::Comb,
        Stmt::assign(Expr::var(&sum), add(&x, 1)),
    ));
    initial(
        &mut top,
        "main",
        vec![
            Stmt::force(Expr::var(&x), c(0xf0, 8)),
            delay(1),
            Stmt::force(Expr::slice(Expr::var(&x), 0, 4), c(0x5, 4)),
            delay(1),
            Stmt::assign(Expr::var(&y), Expr::var(&x)),
            delay(1),
            Stmt::release(Expr::var(&x)),
            Stmt::assign(Expr::var(&z), Expr::var(&x)),
        ],
    );
    vec![top]
}

/// A producer hands items to a consumer through a semaphore; the consumer
/// waits for a ready flag first.
fn handshake() -> Vec<Module> {
    let mut top = Module::new("top", ModuleKind::Design);
    let sem = top.add_var(Variable::new("sem", VarType::Semaphore));
    let ready = top.add_var(Variable::logic("ready", 1));
    let produced = top.add_var(Variable::logic("produced", 8));
    let consumed = top.add_var(Variable::logic("consumed", 8));
    let spare = top.add_var(Variable::logic("spare", 1));
    let keys = || c(1, 32);
    initial(
        &mut top,
        "producer",
        vec![
            delay(2),
            Stmt::assign(Expr::var(&ready), Expr::one()),
            Stmt::while_(
                Expr::binary(BinOp::Lt, Expr::var(&produced), c(4, 8)),
                Stmt::seq(vec![
                    delay(3),
                    Stmt::assign(Expr::var(&produced), add(&produced, 1)),
                    Stmt::sync(SyncOp::SemPut {
                        sem: Expr::var(&sem),
                        keys: keys(),
                    }),
                ]),
            ),
        ],
    );
    initial(
        &mut top,
        "consumer",
        vec![Stmt::wait(
            Expr::var(&ready),
            Stmt::forever(Stmt::seq(vec![
                Stmt::sync(SyncOp::SemGet {
                    sem: Expr::var(&sem),
                    keys: keys(),
                }),
                Stmt::assign(Expr::var(&consumed), add(&consumed, 1)),
            ])),
        )],
    );
    initial(
        &mut top,
        "probe",
        vec![
            delay(20),
            Stmt::assign(
                Expr::var(&spare),
                Expr::Query(Query::SemTryGet {
                    sem: Box::new(Expr::var(&sem)),
                    keys: Box::new(keys()),
                }),
            ),
        ],
    );
    vec![top]
}

/// `class Packet; rand bit [7:0] len; constraint c { len < 64; soft len > 200; }`
fn random() -> Vec<Module> {
    let mut class = Module::new("Packet", ModuleKind::Class { extends: None });
    let len = class.add_var(Variable::logic("len", 8).with_attr(BoolAttr::Rand));
    class.constraints.push(Constraint {
        name: "c".into(),
        items: vec![
            ConstraintItem {
                cond: Expr::binary(BinOp::Lt, Expr::var(&len), c(64, 8)),
                soft: false,
            },
            ConstraintItem {
                cond: Expr::binary(BinOp::Gt, Expr::var(&len), c(200, 8)),
                soft: true,
            },
        ],
    });

    let mut top = Module::new("top", ModuleKind::Design);
    let pkt = top.add_var(Variable::new("pkt", VarType::Class("Packet".into())));
    let ok = top.add_var(Variable::logic("ok", 1));
    let got = top.add_var(Variable::logic("len", 8));
    let mut call = Stmt::method_call(Expr::var(&pkt), "randomize", vec![]);
    if let Stmt::Call(call) = &mut call {
        call.ret = Some(Expr::var(&ok));
    }
    initial(
        &mut top,
        "main",
        vec![
            Stmt::assign(Expr::var(&pkt), Expr::New("Packet".into())),
            call,
            Stmt::assign(Expr::var(&got), Expr::member(Expr::var(&pkt), &len)),
        ],
    );
    vec![top, class]
}

/// The program graph of `design`, with `top` as its entrypoint.
pub fn build(design: Design) -> ir::Context {
    let modules = match design {
        Design::Counter => counter(),
        Design::ForkJoin => fork_join(),
        Design::Force => force(),
        Design::Handshake => handshake(),
        Design::Random => random(),
    };
    ir::Context::new(modules, "top")
}
