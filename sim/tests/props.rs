use proptest::prelude::*;
use strobe_ir::{
    self as ir, BinOp, Direction, Edge, Expr, JoinType, Module, ModuleKind,
    Process, ProcessKind, SenItem, Stmt, Variable,
};
use strobe_sim::{RuntimeConfig, Simulator};

fn simulate(top: Module) -> Simulator {
    Simulator::compile(ir::Context::new(vec![top], "top"), RuntimeConfig::default())
        .unwrap()
}

fn counter(top: &mut Module, name: &str, edge: Edge, clk: &Expr) {
    let cnt = top.add_var(Variable::logic(name, 16));
    top.add_process(Process::new(
        format!("count_{name}"),
        ProcessKind::Always(Some(vec![SenItem::new(edge, clk.clone())])),
        Stmt::nba(
            Expr::var(&cnt),
            Expr::binary(BinOp::Add, Expr::var(&cnt), Expr::constant(1, 16)),
        ),
    ));
}

/// `forever @(edge x) name = name + 1;`
fn waiter(top: &mut Module, name: &str, edge: Edge, x: &Expr) {
    let cnt = top.add_var(Variable::logic(name, 16));
    top.add_process(Process::new(
        format!("wait_{name}"),
        ProcessKind::Initial,
        Stmt::forever(Stmt::timing(
            vec![SenItem::new(edge, x.clone())],
            Stmt::assign(
                Expr::var(&cnt),
                Expr::binary(BinOp::Add, Expr::var(&cnt), Expr::constant(1, 16)),
            ),
        )),
    ));
}

/// Rising and falling edges of a one-bit signal that starts at zero and
/// takes the values of `writes` in turn.
fn edges_of(writes: &[bool]) -> (u64, u64) {
    let (mut pos, mut neg, mut prev) = (0, 0, false);
    for &w in writes {
        match (prev, w) {
            (false, true) => pos += 1,
            (true, false) => neg += 1,
            _ => (),
        }
        prev = w;
    }
    (pos, neg)
}

/// Bits `lsb .. lsb + width` of an 8-bit value.
fn range() -> impl Strategy<Value = (u64, u64)> {
    (0..8u64).prop_flat_map(|lsb| (Just(lsb), 1..=8 - lsb))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn edges_are_counted(writes in prop::collection::vec(any::<bool>(), 0..40)) {
        let mut top = Module::new("top", ModuleKind::Design);
        let clk = top.add_var(Variable::logic("clk", 1).with_direction(Direction::Input));
        let clk = Expr::var(&clk);
        counter(&mut top, "pos", Edge::Pos, &clk);
        counter(&mut top, "neg", Edge::Neg, &clk);
        counter(&mut top, "both", Edge::Both, &clk);
        let mut sim = simulate(top);
        sim.eval().unwrap();

        for &w in &writes {
            sim.set("clk", u64::from(w)).unwrap();
            sim.eval().unwrap();
        }
        let (pos, neg) = edges_of(&writes);
        prop_assert_eq!(sim.get("pos").unwrap(), pos);
        prop_assert_eq!(sim.get("neg").unwrap(), neg);
        prop_assert_eq!(sim.get("both").unwrap(), pos + neg);
    }

    #[test]
    fn waiting_processes_count_edges(writes in prop::collection::vec(any::<bool>(), 0..40)) {
        let mut top = Module::new("top", ModuleKind::Design);
        let x = top.add_var(Variable::logic("x", 1));
        let x_ref = Expr::var(&x);
        waiter(&mut top, "pos", Edge::Pos, &x_ref);
        waiter(&mut top, "neg", Edge::Neg, &x_ref);
        waiter(&mut top, "both", Edge::Both, &x_ref);
        waiter(&mut top, "changes", Edge::Any, &x_ref);
        let mut drive = vec![Stmt::assign(x_ref.clone(), Expr::constant(0, 1))];
        for &w in &writes {
            drive.push(Stmt::delay(Expr::constant(1, 32)));
            drive.push(Stmt::assign(x_ref.clone(), Expr::constant(u64::from(w), 1)));
        }
        top.add_process(Process::new("drive", ProcessKind::Initial, Stmt::seq(drive)));
        let mut sim = simulate(top);
        sim.run().unwrap();

        let (pos, neg) = edges_of(&writes);
        prop_assert_eq!(sim.get("pos").unwrap(), pos);
        prop_assert_eq!(sim.get("neg").unwrap(), neg);
        prop_assert_eq!(sim.get("both").unwrap(), pos + neg);
        prop_assert_eq!(sim.get("changes").unwrap(), pos + neg);
    }

    #[test]
    fn join_resumes_after_the_right_branches(
        delays in prop::collection::vec(1..=5u64, 1..=6),
        any_branch in any::<bool>(),
    ) {
        let n = delays.len() as u64;
        let mut top = Module::new("top", ModuleKind::Design);
        let done = top.add_var(Variable::logic("done", 8));
        let snap = top.add_var(Variable::logic("snap", 8));
        let branches = delays
            .iter()
            .enumerate()
            .map(|(i, d)| {
                Stmt::seq(vec![
                    Stmt::delay(Expr::constant(*d, 32)),
                    Stmt::assign(Expr::slice(Expr::var(&done), i as u64, 1), Expr::one()),
                ])
            })
            .collect();
        let join = if any_branch { JoinType::Any } else { JoinType::All };
        top.add_process(Process::new(
            "main",
            ProcessKind::Initial,
            Stmt::seq(vec![
                Stmt::fork(branches, join),
                Stmt::assign(Expr::var(&snap), Expr::var(&done)),
            ]),
        ));
        let mut sim = simulate(top);
        sim.run().unwrap();

        let first = delays.iter().copied().min().unwrap_or(0);
        let expected = if any_branch {
            delays
                .iter()
                .enumerate()
                .filter(|(_, d)| **d == first)
                .fold(0, |acc, (i, _)| acc | 1 << i)
        } else {
            (1 << n) - 1
        };
        prop_assert_eq!(sim.get("snap").unwrap(), expected);
        // Every branch runs to completion either way.
        prop_assert_eq!(sim.get("done").unwrap(), (1 << n) - 1);
    }

    #[test]
    fn latest_force_of_a_bit_wins(
        stored in 0..256u64,
        forces in prop::collection::vec((range(), 0..256u64), 1..=4),
    ) {
        let mut top = Module::new("top", ModuleKind::Design);
        let x = top.add_var(Variable::logic("x", 8));
        let seen = top.add_var(Variable::logic("seen", 8));
        let frozen = top.add_var(Variable::logic("frozen", 8));

        let mut body = vec![Stmt::assign(Expr::var(&x), Expr::constant(stored, 8))];
        let mut expected = stored;
        for ((lsb, width), value) in &forces {
            let value = ir::mask(*value, *width);
            body.push(Stmt::force(
                Expr::slice(Expr::var(&x), *lsb, *width),
                Expr::constant(value, *width),
            ));
            let m = ir::mask(u64::MAX, *width) << lsb;
            expected = (expected & !m) | (value << lsb);
        }
        body.extend([
            Stmt::assign(Expr::var(&seen), Expr::var(&x)),
            Stmt::release(Expr::var(&x)),
            Stmt::assign(Expr::var(&frozen), Expr::var(&x)),
        ]);
        top.add_process(Process::new("main", ProcessKind::Initial, Stmt::seq(body)));
        let mut sim = simulate(top);
        sim.run().unwrap();

        prop_assert_eq!(sim.get("seen").unwrap(), expected);
        prop_assert_eq!(sim.get("frozen").unwrap(), expected);
    }
}
