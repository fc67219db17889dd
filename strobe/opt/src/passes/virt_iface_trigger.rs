use crate::analysis::ReadWriteSet;
use crate::traversal::{Action, ConstructVisitor, Named, VisResult, Visitor};
use strobe_ir::{
    self as ir, AssignKind, BoolAttr, Expr, LvalueTarget, Module,
    ProcessKind, Stmt, VarType, Variable, RRC, VIRT_IFACE_TRIGGER_VAR,
};
use strobe_utils::StrobeResult;

/// `obj` is a virtual interface handle.
pub fn is_virt_iface(obj: &Expr) -> bool {
    let var = match obj {
        Expr::Var(vr) => &vr.var,
        Expr::Member { field, .. } => &field.var,
        _ => return false,
    };
    matches!(var.borrow().typ, VarType::VirtIface(_))
}

/// Some expression of the statement tree reads a member through a virtual
/// interface handle.
pub fn reads_virt_iface(body: &Stmt) -> bool {
    body.any(&mut |s| {
        s.exprs().into_iter().any(|e| {
            let mut found = false;
            e.visit(&mut |x| {
                if let Expr::Member { obj, .. } = x {
                    found |= is_virt_iface(obj);
                }
            });
            found
        })
    })
}

/// The statement writes a member of an interface through a virtual
/// interface handle. Returns the kind of the write.
fn vif_write(stmt: &Stmt) -> Option<AssignKind> {
    let through = ReadWriteSet::lvalues(stmt).into_iter().any(|lv| {
        matches!(lv.target(), Some(LvalueTarget::Field { obj, .. }) if is_virt_iface(obj))
    });
    if !through {
        return None;
    }
    match stmt {
        Stmt::Assign(a) => Some(a.kind),
        _ => Some(AssignKind::Blocking),
    }
}

/// Signals the scheduler after writes through virtual interface handles.
///
/// Members of interfaces are not visible to the static sensitivity
/// analysis when they are written through a handle, so every such write is
/// followed by `__VvirtIfaceTrigger = 1` (`<=` after a nonblocking write).
/// Consecutive writes in a block share one assignment. The scheduler
/// turns the variable into an act trigger for every process that reads
/// through a virtual interface.
///
/// Continuous assignments writing through a handle become combinational
/// processes.
pub struct VirtIfaceTrigger {
    trigger: RRC<Variable>,
    /// Number of inserted trigger assignments.
    inserted: u64,
}

impl Named for VirtIfaceTrigger {
    fn name() -> &'static str {
        "virt-iface-trigger"
    }

    fn description() -> &'static str {
        "Set the virtual interface trigger after writes through a handle"
    }
}

impl ConstructVisitor for VirtIfaceTrigger {
    fn from(_ctx: &ir::Context) -> StrobeResult<Self> {
        let trigger = Variable::logic(VIRT_IFACE_TRIGGER_VAR, 1)
            .with_init(0)
            .with_attr(BoolAttr::Generated);
        Ok(VirtIfaceTrigger {
            trigger: ir::rrc(trigger),
            inserted: 0,
        })
    }

    fn clear_data(&mut self) {}
}

impl VirtIfaceTrigger {
    fn set_trigger(&mut self, kind: AssignKind) -> Stmt {
        self.inserted += 1;
        let lhs = Expr::var(&self.trigger);
        match kind {
            AssignKind::Blocking => Stmt::assign(lhs, Expr::one()),
            AssignKind::NonBlocking => Stmt::nba(lhs, Expr::one()),
        }
    }

    fn insert(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Seq(seq) => {
                let mut out = Vec::with_capacity(seq.stmts.len());
                // Kinds of the writes since the last trigger assignment.
                let mut pending: Vec<AssignKind> = vec![];
                for mut s in std::mem::take(&mut seq.stmts) {
                    if let Some(kind) = vif_write(&s) {
                        if !pending.contains(&kind) {
                            pending.push(kind);
                        }
                        out.push(s);
                        continue;
                    }
                    out.extend(pending.drain(..).map(|k| self.set_trigger(k)));
                    self.insert(&mut s);
                    out.push(s);
                }
                out.extend(pending.drain(..).map(|k| self.set_trigger(k)));
                seq.stmts = out;
            }
            s => {
                if let Some(kind) = vif_write(s) {
                    let write = std::mem::take(s);
                    *s = Stmt::seq(vec![write, self.set_trigger(kind)]);
                } else {
                    s.children_mut().into_iter().for_each(|c| self.insert(c));
                }
            }
        }
    }
}

impl Visitor for VirtIfaceTrigger {
    fn precondition(ctx: &ir::Context) -> Option<String> {
        let any_vif = ctx.modules.iter().any(|m| {
            m.vars
                .iter()
                .any(|v| matches!(v.borrow().typ, VarType::VirtIface(_)))
        });
        if any_vif {
            None
        } else {
            Some("no virtual interface handles".to_string())
        }
    }

    fn start_task(
        &mut self,
        task: &mut ir::Task,
        _module: &mut Module,
        _comps: &[Module],
    ) -> VisResult {
        self.insert(&mut task.body);
        Ok(Action::SkipChildren)
    }

    fn start_process(
        &mut self,
        proc: &mut ir::Process,
        _module: &mut Module,
        _comps: &[Module],
    ) -> VisResult {
        let before = self.inserted;
        self.insert(&mut proc.body);
        if self.inserted > before && matches!(proc.kind, ProcessKind::Continuous)
        {
            proc.kind = ProcessKind::Comb;
        }
        Ok(Action::SkipChildren)
    }

    fn finish_context(&mut self, ctx: &mut ir::Context) -> StrobeResult<()> {
        if self.inserted == 0 {
            return Ok(());
        }
        let Some(top) = ctx.entrypoint_mut() else {
            return Ok(());
        };
        if top.find_var(VIRT_IFACE_TRIGGER_VAR).is_none() {
            top.vars.add(std::rc::Rc::clone(&self.trigger));
        }
        log::info!(
            "{}: {} trigger assignments",
            Self::name(),
            self.inserted
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::{ModuleKind, Process, Task, TaskKind};

    /// Interface `bus` with a member `sig`, and a class holding a virtual
    /// handle to it.
    fn setup() -> (Module, Module, RRC<Variable>, RRC<Variable>) {
        let mut bus = Module::new("bus", ModuleKind::Interface);
        let sig = bus.add_var(Variable::logic("sig", 1));
        let mut drv = Module::new("Driver", ModuleKind::Class { extends: None });
        let vif = drv.add_var(Variable::new("vif", VarType::VirtIface("bus".into())));
        (bus, drv, sig, vif)
    }

    #[test]
    fn consecutive_writes_share_a_trigger() {
        let (bus, mut drv, sig, vif) = setup();
        let member = || Expr::member(Expr::var(&vif), &sig);
        drv.add_task(Task::new(
            "drive",
            TaskKind::Task,
            Stmt::seq(vec![
                Stmt::assign(member(), Expr::one()),
                Stmt::assign(member(), Expr::zero()),
                Stmt::delay(Expr::constant(1, 32)),
                Stmt::nba(member(), Expr::one()),
                Stmt::if_(
                    Expr::var(&vif),
                    Stmt::assign(member(), Expr::one()),
                    Stmt::empty(),
                ),
            ]),
        ));
        let top = Module::new("top", ModuleKind::Design);
        let mut ctx = ir::Context::new(vec![top, bus, drv], "top");
        VirtIfaceTrigger::do_pass_default(&mut ctx).unwrap();

        let drv = ctx.find_module("Driver").unwrap();
        let body = ir::Printer::stmt_to_str(&drv.find_task("drive").unwrap().borrow().body);
        assert_eq!(
            body,
            "begin\n  vif.sig = 1'd1;\n  vif.sig = 1'd0;\n  __VvirtIfaceTrigger = 1'd1;\n  \
             #32'd1;\n  vif.sig <= 1'd1;\n  __VvirtIfaceTrigger <= 1'd1;\n  if (vif)\n    \
             begin\n      vif.sig = 1'd1;\n      __VvirtIfaceTrigger = 1'd1;\n    end\nend\n"
        );
        let trig = ctx.entrypoint().unwrap().find_var(VIRT_IFACE_TRIGGER_VAR).unwrap();
        assert_eq!(trig.borrow().init, Some(0));
    }

    #[test]
    fn continuous_writes_become_combinational() {
        let (bus, drv, sig, _) = setup();
        let mut top = Module::new("top", ModuleKind::Design);
        let vif = top.add_var(Variable::new("vif", VarType::VirtIface("bus".into())));
        let x = top.add_var(Variable::logic("x", 1));
        top.add_process(Process::new(
            "drive",
            ProcessKind::Continuous,
            Stmt::assign(Expr::member(Expr::var(&vif), &sig), Expr::var(&x)),
        ));
        top.add_process(Process::new(
            "plain",
            ProcessKind::Continuous,
            Stmt::assign(Expr::var(&x), Expr::one()),
        ));
        let mut ctx = ir::Context::new(vec![top, bus, drv], "top");
        VirtIfaceTrigger::do_pass_default(&mut ctx).unwrap();
        let top = ctx.entrypoint().unwrap();
        let drive = top.find_process("drive").unwrap();
        assert!(matches!(drive.borrow().kind, ProcessKind::Comb));
        let plain = top.find_process("plain").unwrap();
        assert!(matches!(plain.borrow().kind, ProcessKind::Continuous));
    }

    #[test]
    fn designs_without_handles_are_skipped() {
        let top = Module::new("top", ModuleKind::Design);
        let ctx = ir::Context::new(vec![top], "top");
        assert!(VirtIfaceTrigger::precondition(&ctx).is_some());
    }
}
