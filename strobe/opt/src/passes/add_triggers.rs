use crate::traversal::{Action, Named, VisResult, Visitor};
use std::collections::HashSet;
use std::rc::Rc;
use strobe_ir::{
    self as ir, AssignKind, BoolAttr, Builder, Direction, Edge, Expr,
    LvalueTarget, Module, Process, ProcessKind, SenItem, Stmt, VarType,
    Variable, RRC,
};
use strobe_utils::{Error, StrobeResult};

/// Fires edge events when the variables they belong to change.
///
/// Every blocking assignment to a variable with edge events is wrapped:
/// ```text
///                  __Vprevval0__clk = clk;
/// clk = e;    =>   clk = e;
///                  if (!__Vprevval0__clk[0] && clk[0]) -> posedge event of clk;
/// ```
/// with `old && !new` for falling edges and `old != new` for any change.
///
/// Variables with edge events that the design does not write with blocking
/// assignments (inputs, public or clocked signals, and targets of
/// nonblocking assignments) get an event bridge instead:
/// `always @(posedge clk) if (!ev) -> ev;`.
/// Members of objects written by nonblocking assignments fire their
/// events when the simulator commits the write.
#[derive(Default)]
pub struct AddTriggers {
    /// Task or process whose body is being visited.
    unit: ir::Id,
    /// Variables of the module written by a nonblocking assignment.
    nba_targets: HashSet<ir::Id>,
    /// Number of assignments that fire events.
    wrapped: u64,
}

impl Named for AddTriggers {
    fn name() -> &'static str {
        "add-triggers"
    }

    fn description() -> &'static str {
        "Fire edge events after assignments to the signals they observe"
    }
}

/// Edge events of `var` as `(edge, event)` pairs, in creation order.
fn events_of(
    module: &Module,
    comps: &[Module],
    var: &RRC<Variable>,
) -> StrobeResult<Vec<(Edge, RRC<Variable>)>> {
    let owner = if module.vars.iter().any(|v| Rc::ptr_eq(v, var)) {
        Some(module)
    } else {
        comps
            .iter()
            .find(|m| m.vars.iter().any(|v| Rc::ptr_eq(v, var)))
    };
    let v = var.borrow();
    v.edge_events
        .iter()
        .map(|(edge, id)| {
            owner
                .and_then(|m| m.find_var(*id))
                .map(|ev| (*edge, ev))
                .ok_or_else(|| {
                    Error::malformed_structure(format!(
                        "Edge event `{id}` of `{}` is not defined",
                        v.name
                    ))
                })
        })
        .collect()
}

/// The condition under which `edge` fired going from `old` to `new`.
pub(super) fn edge_cond(edge: Edge, old: Expr, new: Expr) -> Expr {
    let bit = |e: Expr| Expr::slice(e, 0, 1);
    match edge {
        Edge::Pos => Expr::log_and(Expr::lognot(bit(old)), bit(new)),
        Edge::Neg => Expr::log_and(bit(old), Expr::lognot(bit(new))),
        Edge::Both => Expr::neq(bit(old), bit(new)),
        Edge::Any => Expr::neq(old, new),
    }
}

impl Visitor for AddTriggers {
    fn start_task(
        &mut self,
        task: &mut ir::Task,
        _module: &mut Module,
        _comps: &[Module],
    ) -> VisResult {
        self.unit = task.name;
        Ok(Action::Continue)
    }

    fn start_process(
        &mut self,
        proc: &mut ir::Process,
        _module: &mut Module,
        _comps: &[Module],
    ) -> VisResult {
        // Bridges fire events themselves.
        if proc.attributes.has(BoolAttr::EventBridge) {
            return Ok(Action::SkipChildren);
        }
        self.unit = proc.name;
        Ok(Action::Continue)
    }

    fn assign(
        &mut self,
        s: &mut ir::Assign,
        module: &mut Module,
        comps: &[Module],
    ) -> VisResult {
        let Some(target) = s.lhs.target() else {
            return Ok(Action::Continue);
        };
        let (storage, value) = match target {
            LvalueTarget::Var(vr) => (Rc::clone(&vr.var), Expr::Var(vr.clone())),
            LvalueTarget::Field { obj, field } => (
                Rc::clone(&field.var),
                Expr::Member {
                    obj: Box::new(obj.clone()),
                    field: field.clone(),
                },
            ),
        };
        if !storage.borrow().has_edge_events() {
            return Ok(Action::Continue);
        }
        if s.kind == AssignKind::NonBlocking {
            if matches!(value, Expr::Var(_)) {
                self.nba_targets.insert(storage.borrow().name);
            }
            return Ok(Action::Continue);
        }

        let events = events_of(module, comps, &storage)?;
        let (name, width) = {
            let v = storage.borrow();
            (v.name, v.width())
        };
        let prev_name = module.generate_numbered("__Vprevval", format!("__{name}"));
        let prev = Builder::new(module).add_named_local(
            prev_name,
            VarType::Logic { width },
            self.unit,
        );

        let mut stmts = vec![
            Stmt::assign(Expr::var(&prev), value.clone()),
            Stmt::Assign(s.clone()),
        ];
        for (edge, ev) in events {
            let event = match &value {
                Expr::Member { obj, .. } => Expr::member(obj.as_ref().clone(), &ev),
                _ => Expr::var(&ev),
            };
            stmts.push(Stmt::if_(
                edge_cond(edge, Expr::var(&prev), value.clone()),
                Stmt::fire(event),
                Stmt::empty(),
            ));
        }
        self.wrapped += 1;
        Ok(Action::change(Stmt::seq(stmts)))
    }

    fn finish(&mut self, module: &mut Module, _comps: &[Module]) -> VisResult {
        let bridged: Vec<RRC<Variable>> = module
            .vars
            .iter()
            .filter(|v| {
                let v = v.borrow();
                v.has_edge_events()
                    && !v.is_local()
                    && (matches!(v.direction, Direction::Input | Direction::Inout)
                        || v.attributes.has(BoolAttr::Public)
                        || v.attributes.has(BoolAttr::Clocked)
                        || self.nba_targets.contains(&v.name))
            })
            .cloned()
            .collect();

        let mut bridges = 0;
        for var in bridged {
            for (edge, ev) in events_of(module, &[], &var)? {
                let name = format!(
                    "__Vbridge__{}__{}",
                    edge.keyword(),
                    var.borrow().name
                );
                if module.find_process(name.as_str()).is_some() {
                    continue;
                }
                let mut proc = Process::new(
                    name,
                    ProcessKind::Always(Some(vec![SenItem::new(
                        edge,
                        Expr::var(&var),
                    )])),
                    Stmt::if_(
                        Expr::lognot(Expr::var(&ev)),
                        Stmt::fire(Expr::var(&ev)),
                        Stmt::empty(),
                    ),
                );
                proc.attributes.insert(BoolAttr::EventBridge);
                proc.attributes.insert(BoolAttr::Generated);
                module.add_process(proc);
                bridges += 1;
            }
        }
        if self.wrapped > 0 || bridges > 0 {
            log::info!(
                "{}: {} assignments fire events, {bridges} event bridges",
                module.name,
                self.wrapped
            );
        }
        Ok(Action::Continue)
    }
}
