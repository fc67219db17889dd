use super::virt_iface_trigger::{is_virt_iface, reads_virt_iface};
use crate::analysis::ReadWriteSet;
use crate::traversal::{
    Action, ConstructVisitor, Named, ParseVal, PassOpt, VisResult, Visitor,
};
use std::rc::Rc;
use strobe_ir::{
    self as ir, Block, BoolAttr, Edge, Expr, Module, Process, ProcessKind,
    Schedule, SenItem, Trigger, Variable, RRC, VIRT_IFACE_TRIGGER_VAR,
};
use strobe_utils::{Error, StrobeResult};

/// Computes the region schedule of the top-level module.
///
/// - `stl` runs every combinational process once, then again whenever
///   something it reads changes, until nothing changes.
/// - `ico` reacts to changed inputs with the combinational processes that
///   depend on them, directly or through other combinational processes.
/// - `act` runs the event bridges and then resumes suspended processes.
/// - `nba` runs clocked processes and combinational logic. It is gated on
///   the bits of the `act` trigger vector, so both regions share one list
///   of triggers.
///
/// `initial` and `final` processes are not part of the schedule: the
/// simulator runs them as coroutines.
pub struct RegionSchedule {
    converge_limit: u32,
}

impl Named for RegionSchedule {
    fn name() -> &'static str {
        "region-schedule"
    }

    fn description() -> &'static str {
        "Order processes into the stl, ico, act, and nba regions"
    }

    fn opts() -> Vec<PassOpt> {
        vec![PassOpt::new(
            "converge-limit",
            "Iterations of a region loop before evaluation is abandoned",
            ParseVal::Num(100),
            PassOpt::parse_num,
        )]
    }
}

impl ConstructVisitor for RegionSchedule {
    fn from(ctx: &ir::Context) -> StrobeResult<Self> {
        let opts = Self::get_opts(ctx);
        let limit = opts["converge-limit"].pos_num().unwrap_or(100);
        Ok(RegionSchedule {
            converge_limit: u32::try_from(limit).unwrap_or(u32::MAX).max(1),
        })
    }

    fn clear_data(&mut self) {}
}

/// Variables of `module` read by `proc`, excluding automatic variables.
fn module_reads(module: &Module, proc: &Process) -> Vec<RRC<Variable>> {
    ReadWriteSet::read_set(&proc.body)
        .into_iter()
        .filter(|v| {
            !v.borrow().is_local()
                && v.borrow().name != VIRT_IFACE_TRIGGER_VAR
                && module.vars.iter().any(|m| Rc::ptr_eq(m, v))
        })
        .collect()
}

fn changed(vars: &[RRC<Variable>]) -> Vec<Trigger> {
    vars.iter().map(|v| Trigger::Changed(v.borrow().name)).collect()
}

/// Triggers of one item of a sensitivity list.
fn sens_triggers(module: &Module, item: &SenItem) -> Vec<Trigger> {
    if let Expr::Var(vr) = &item.expr {
        let var = vr.var.borrow();
        return match item.edge {
            Edge::Pos | Edge::Neg | Edge::Both if var.width() == 1 => {
                vec![Trigger::Edge {
                    var: var.name,
                    edge: item.edge,
                }]
            }
            _ => vec![Trigger::Changed(var.name)],
        };
    }
    let mut out: Vec<Trigger> = ReadWriteSet::expr_reads(&item.expr)
        .iter()
        .filter(|v| module.vars.iter().any(|m| Rc::ptr_eq(m, v)))
        .map(|v| Trigger::Changed(v.borrow().name))
        .collect();
    let mut through_vif = false;
    item.expr.visit(&mut |e| {
        if let Expr::Member { obj, .. } = e {
            through_vif |= is_virt_iface(obj);
        }
    });
    if through_vif {
        out.push(Trigger::VirtIface);
    }
    out
}

impl RegionSchedule {
    fn check(proc: &Process) -> StrobeResult<()> {
        match &proc.kind {
            ProcessKind::Always(None) => Err(Error::unsupported(format!(
                "always block `{}` without timing control",
                proc.name
            ))
            .with_pos(&proc.pos)),
            ProcessKind::Always(Some(_)) | ProcessKind::Comb | ProcessKind::Continuous
                if proc.is_suspendable() =>
            {
                Err(Error::pass_assumption(
                    Self::name(),
                    format!("process `{}` is statically scheduled but can suspend", proc.name),
                ))
            }
            _ => Ok(()),
        }
    }

    pub fn schedule(&self, module: &Module) -> StrobeResult<Schedule> {
        let mut sched = Schedule::new(self.converge_limit);
        let procs: Vec<RRC<Process>> = module.processes.iter().cloned().collect();
        for p in &procs {
            Self::check(&p.borrow())?;
        }
        let comb: Vec<&RRC<Process>> =
            procs.iter().filter(|p| p.borrow().is_combinational()).collect();
        let vif = module.find_var(VIRT_IFACE_TRIGGER_VAR).is_some();
        // Gate of a combinational process outside of stl.
        let comb_gate = |p: &Process| {
            let mut gate = changed(&module_reads(module, p));
            if vif && reads_virt_iface(&p.body) {
                gate.push(Trigger::VirtIface);
            }
            gate
        };

        // stl
        for p in &comb {
            let p = p.borrow();
            let mut gate = vec![Trigger::FirstIteration];
            gate.extend(comb_gate(&p));
            sched.stl.add_block(Block::Process(p.name), &gate);
        }

        // ico
        let inputs: Vec<RRC<Variable>> = module
            .ports()
            .filter(|v| {
                matches!(v.borrow().direction, ir::Direction::Input | ir::Direction::Inout)
            })
            .cloned()
            .collect();
        for t in changed(&inputs) {
            sched.ico.add_trigger(t);
        }
        let mut reached: Vec<RRC<Variable>> = inputs.clone();
        let mut in_ico = vec![false; comb.len()];
        let mut grew = true;
        while grew {
            grew = false;
            for (i, p) in comb.iter().enumerate() {
                if in_ico[i] {
                    continue;
                }
                let p = p.borrow();
                let reads = module_reads(module, &p);
                if reads.iter().any(|r| reached.iter().any(|v| Rc::ptr_eq(v, r))) {
                    in_ico[i] = true;
                    reached.extend(ReadWriteSet::write_set(&p.body));
                    grew = true;
                }
            }
        }
        for (p, _) in comb.iter().zip(&in_ico).filter(|(_, inc)| **inc) {
            let p = p.borrow();
            sched.ico.add_block(Block::Process(p.name), &comb_gate(&p));
        }

        // act and nba share their triggers.
        let clocked: Vec<&RRC<Process>> =
            procs.iter().filter(|p| p.borrow().sens().is_some()).collect();
        let gate_of = |p: &Process| -> Vec<Trigger> {
            p.sens()
                .map(|sens| sens.iter().flat_map(|i| sens_triggers(module, i)).collect())
                .unwrap_or_default()
        };
        for p in &clocked {
            for t in gate_of(&p.borrow()) {
                sched.act.add_trigger(t);
            }
        }
        for p in &comb {
            for t in comb_gate(&p.borrow()) {
                sched.act.add_trigger(t);
            }
        }
        sched.act.add_trigger(Trigger::DynamicResume);
        if vif {
            sched.act.add_trigger(Trigger::VirtIface);
        }
        for p in clocked.iter().filter(|p| p.borrow().attributes.has(BoolAttr::EventBridge)) {
            let p = p.borrow();
            sched.act.add_block(Block::Process(p.name), &gate_of(&p));
        }
        sched.act.add_block(Block::ResumeDynamic, &[Trigger::DynamicResume]);

        sched.nba.triggers = sched.act.triggers.clone();
        for p in &procs {
            let p = p.borrow();
            if p.attributes.has(BoolAttr::EventBridge) {
                continue;
            }
            if p.sens().is_some() {
                sched.nba.add_block(Block::Process(p.name), &gate_of(&p));
            } else if p.is_combinational() {
                sched.nba.add_block(Block::Process(p.name), &comb_gate(&p));
            }
        }
        Ok(sched)
    }
}

impl Visitor for RegionSchedule {
    fn start_context(&mut self, ctx: &mut ir::Context) -> StrobeResult<()> {
        let name = ctx.entrypoint;
        let top = ctx
            .entrypoint_mut()
            .ok_or_else(|| Error::undefined(name, "entrypoint module"))?;
        let sched = self.schedule(top)?;
        log::info!(
            "{}: stl {}/{}, ico {}/{}, act {}/{}, nba {}/{} (blocks/triggers)",
            top.name,
            sched.stl.blocks.len(),
            sched.stl.triggers.len(),
            sched.ico.blocks.len(),
            sched.ico.triggers.len(),
            sched.act.blocks.len(),
            sched.act.triggers.len(),
            sched.nba.blocks.len(),
            sched.nba.triggers.len(),
        );
        top.schedule = Some(sched);
        Ok(())
    }

    fn start(&mut self, _module: &mut Module, _comps: &[Module]) -> VisResult {
        Ok(Action::Stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::{Direction, ModuleKind, Stmt};

    fn flop_and_wire() -> Module {
        let mut top = Module::new("top", ModuleKind::Design);
        let clk = top.add_var(Variable::logic("clk", 1).with_direction(Direction::Input));
        let d = top.add_var(Variable::logic("d", 1).with_direction(Direction::Input));
        let q = top.add_var(Variable::logic("q", 1));
        let y = top.add_var(Variable::logic("y", 1));
        let nd = top.add_var(Variable::logic("nd", 1));
        top.add_process(Process::new(
            "ff",
            ProcessKind::Always(Some(vec![SenItem::new(Edge::Pos, Expr::var(&clk))])),
            Stmt::nba(Expr::var(&q), Expr::var(&d)),
        ));
        top.add_process(Process::new(
            "wire",
            ProcessKind::Continuous,
            Stmt::assign(Expr::var(&y), Expr::var(&q)),
        ));
        top.add_process(Process::new(
            "inv",
            ProcessKind::Comb,
            Stmt::assign(Expr::var(&nd), Expr::not(Expr::var(&d))),
        ));
        top
    }

    fn schedule(top: Module, opts: &[&str]) -> StrobeResult<Schedule> {
        let mut ctx = ir::Context::new(vec![top], "top");
        ctx.extra_opts = opts.iter().map(|s| s.to_string()).collect();
        RegionSchedule::do_pass_default(&mut ctx)?;
        Ok(ctx.entrypoint().unwrap().schedule.clone().unwrap())
    }

    #[test]
    fn regions_of_a_flop_and_wires() {
        let s = schedule(flop_and_wire(), &[]).unwrap();
        assert_eq!(s.converge_limit, 100);

        let q = Trigger::Changed("q".into());
        let d = Trigger::Changed("d".into());
        let clk = Trigger::Edge {
            var: "clk".into(),
            edge: Edge::Pos,
        };
        assert_eq!(s.stl.triggers, vec![Trigger::FirstIteration, q, d]);
        assert_eq!(s.stl.blocks.len(), 2);

        // Only `inv` depends on an input.
        assert_eq!(s.ico.triggers[..2], [Trigger::Changed("clk".into()), d]);
        assert_eq!(s.ico.blocks.len(), 1);
        assert_eq!(s.ico.blocks[0].block, Block::Process("inv".into()));

        assert_eq!(s.act.triggers, vec![clk, q, d, Trigger::DynamicResume]);
        assert_eq!(s.nba.triggers, s.act.triggers);
        assert_eq!(s.act.blocks.len(), 1);
        assert_eq!(s.act.blocks[0].block, Block::ResumeDynamic);
        assert_eq!(s.act.blocks[0].gate, vec![3]);

        let nba: Vec<_> = s.nba.blocks.iter().map(|b| (b.block.clone(), b.gate.clone())).collect();
        assert_eq!(
            nba,
            vec![
                (Block::Process("ff".into()), vec![0]),
                (Block::Process("wire".into()), vec![1]),
                (Block::Process("inv".into()), vec![2]),
            ]
        );
    }

    #[test]
    fn task_arguments_are_not_inputs() {
        let mut top = flop_and_wire();
        top.add_var(
            Variable::logic("arg", 4)
                .with_direction(Direction::Input)
                .with_scope(ir::Scope::Local("t".into())),
        );
        assert_eq!(top.ports().count(), 2);
        let s = schedule(top, &[]).unwrap();
        assert!(!s.ico.triggers.contains(&Trigger::Changed("arg".into())));
        assert_eq!(
            s.ico.triggers[..2],
            [Trigger::Changed("clk".into()), Trigger::Changed("d".into())]
        );
    }

    #[test]
    fn bridges_run_before_resumption() {
        let mut top = flop_and_wire();
        let clk = top.find_var("clk").unwrap();
        let ev = top.add_var(Variable::new("ev", ir::VarType::Event));
        let mut bridge = Process::new(
            "bridge",
            ProcessKind::Always(Some(vec![SenItem::new(Edge::Pos, Expr::var(&clk))])),
            Stmt::fire(Expr::var(&ev)),
        );
        bridge.attributes.insert(BoolAttr::EventBridge);
        top.add_process(bridge);
        let s = schedule(top, &["region-schedule:converge-limit=7"]).unwrap();
        assert_eq!(s.converge_limit, 7);
        let act: Vec<_> = s.act.blocks.iter().map(|b| b.block.clone()).collect();
        assert_eq!(act, vec![Block::Process("bridge".into()), Block::ResumeDynamic]);
        assert!(s.nba.blocks.iter().all(|b| b.block != Block::Process("bridge".into())));
    }

    #[test]
    fn unschedulable_processes() {
        let mut top = Module::new("top", ModuleKind::Design);
        top.add_process(Process::new("spin", ProcessKind::Always(None), Stmt::empty()));
        let err = schedule(top, &[]).unwrap_err();
        assert!(err.is_unsupported());

        let mut top = flop_and_wire();
        let ff = top.find_process("ff").unwrap();
        ff.borrow_mut().attributes.insert(BoolAttr::Suspendable);
        let err = schedule(top, &[]).unwrap_err();
        assert!(err.is_pass_assumption());
    }
}
