use crate::traversal::{
    Action, ConstructVisitor, DiagnosticContext, DiagnosticPass, Named,
    VisResult, Visitor,
};
use itertools::Itertools;
use std::rc::Rc;
use strobe_ir::{
    self as ir, BoolAttr, Builder, Edge, Expr, Module, SenItem, Stmt, VarType,
    Variable, RRC,
};
use strobe_utils::{Error, StrobeResult};

/// Creates and looks up the edge events of variables.
///
/// There is at most one event per variable and edge kind. The name of an
/// event is remembered in [Variable::edge_events] so later passes find it.
/// Events of variables that belong to a module other than the one being
/// traversed are kept aside until [EdgeEvents::commit] adds them.
#[derive(Default)]
pub struct EdgeEvents {
    pending: Vec<(ir::Id, RRC<Variable>)>,
    created: u64,
}

impl EdgeEvents {
    pub fn event_name(var: ir::Id, edge: Edge) -> String {
        format!("__VedgeEvent__{}__{var}", edge.keyword())
    }

    /// The event fired by `edge` of `var`, creating it on first use.
    pub fn get_or_create(
        &mut self,
        module: &mut Module,
        comps: &[Module],
        var: &RRC<Variable>,
        edge: Edge,
    ) -> StrobeResult<RRC<Variable>> {
        let (name, existing) = {
            let v = var.borrow();
            (v.name, v.edge_event(edge))
        };
        let local = module.vars.iter().any(|v| Rc::ptr_eq(v, var));
        let owner = if local {
            module.name
        } else {
            comps
                .iter()
                .find(|m| m.vars.iter().any(|v| Rc::ptr_eq(v, var)))
                .map(|m| m.name)
                .ok_or_else(|| {
                    Error::malformed_structure(format!(
                        "Variable `{name}` does not belong to any module"
                    ))
                })?
        };

        if let Some(id) = existing {
            let owned = if local {
                module.find_var(id)
            } else {
                ir::find_module(comps, owner).and_then(|m| m.find_var(id))
            };
            return owned
                .or_else(|| {
                    self.pending
                        .iter()
                        .find(|(m, v)| *m == owner && v.borrow().name == id)
                        .map(|(_, v)| Rc::clone(v))
                })
                .ok_or_else(|| {
                    Error::malformed_structure(format!(
                        "Edge event `{id}` of `{name}` is not defined"
                    ))
                });
        }

        let event = if local {
            let ev_name = module.generate_name(Self::event_name(name, edge));
            Builder::new(module).add_named_var(ev_name, VarType::Event)
        } else {
            let ev = ir::rrc(
                Variable::new(Self::event_name(name, edge), VarType::Event)
                    .with_attr(BoolAttr::Generated),
            );
            self.pending.push((owner, Rc::clone(&ev)));
            ev
        };
        let ev_name = event.borrow().name;
        var.borrow_mut().edge_events.push((edge, ev_name));
        log::debug!("{owner}: created `{ev_name}` for {edge} of `{name}`");
        self.created += 1;
        Ok(event)
    }

    /// Add the events created for variables of modules other than the one
    /// they were requested from.
    pub fn commit(&mut self, modules: &mut [Module]) {
        for (owner, ev) in self.pending.drain(..) {
            if let Some(m) = modules.iter_mut().find(|m| m.name == owner) {
                m.add_names([ev.borrow().name]);
                m.vars.add(ev);
            }
        }
    }

    /// Number of events created so far.
    pub fn created(&self) -> u64 {
        self.created
    }
}

/// Rewrites event controls and wait statements in terms of edge events.
///
/// `@(posedge clk)` waits on the event for the rising edge of `clk`;
/// `@(edge clk)` waits on both the rising and the falling edge events.
/// `wait (cond)` becomes a loop that waits on a change of anything `cond`
/// reads:
/// ```text
/// wait (a && b) s;   =>   while (!(a && b)) @(anyedge ev_a or anyedge ev_b);
///                         s;
/// ```
/// Sensitivity lists of `always` processes stay as they are; they are
/// scheduled statically.
pub struct CreateEvents {
    events: EdgeEvents,
    diag: DiagnosticContext,
}

impl Named for CreateEvents {
    fn name() -> &'static str {
        "create-events"
    }

    fn description() -> &'static str {
        "Lower event controls and wait statements onto edge events"
    }
}

impl ConstructVisitor for CreateEvents {
    fn from(_ctx: &ir::Context) -> StrobeResult<Self> {
        Ok(CreateEvents {
            events: EdgeEvents::default(),
            diag: DiagnosticContext::default(),
        })
    }

    fn clear_data(&mut self) {}
}

impl DiagnosticPass for CreateEvents {
    fn diagnostics(&self) -> &DiagnosticContext {
        &self.diag
    }
}

/// Plain variables and member accesses read by `expr`. Handles are left
/// out.
fn wake_sources(expr: &Expr) -> Vec<Expr> {
    let mut out = vec![];
    expr.visit(&mut |e| {
        let var = match e {
            Expr::Var(vr) => &vr.var,
            Expr::Member { field, .. } => &field.var,
            _ => return,
        };
        if !var.borrow().typ.is_handle() {
            out.push(e.clone());
        }
    });
    out.into_iter()
        .unique_by(ir::Printer::expr_to_str)
        .collect()
}

/// Automatic variables only change in the unit that waits on them, so
/// they have no edge events.
fn is_automatic(expr: &Expr) -> bool {
    matches!(expr, Expr::Var(vr) if vr.var.borrow().is_local())
}

fn is_event(expr: &Expr) -> bool {
    expr.target_storage()
        .is_some_and(|vr| vr.var.borrow().typ == VarType::Event)
}

impl CreateEvents {
    /// Expression naming the event for `edge` of `src`.
    fn event_of(
        &mut self,
        src: &Expr,
        edge: Edge,
        module: &mut Module,
        comps: &[Module],
    ) -> StrobeResult<Expr> {
        match src {
            Expr::Var(vr) => {
                let ev = self.events.get_or_create(module, comps, &vr.var, edge)?;
                Ok(Expr::var(&ev))
            }
            Expr::Member { obj, field } => {
                let ev =
                    self.events.get_or_create(module, comps, &field.var, edge)?;
                Ok(Expr::member(obj.as_ref().clone(), &ev))
            }
            _ => Err(Error::malformed_structure(format!(
                "`{src}` does not name a variable"
            ))),
        }
    }

    fn lower_item(
        &mut self,
        item: SenItem,
        module: &mut Module,
        comps: &[Module],
    ) -> StrobeResult<Vec<SenItem>> {
        if is_event(&item.expr) {
            return Ok(vec![SenItem::new(Edge::Any, item.expr)]);
        }
        let sources = match (&item.expr, item.edge) {
            (Expr::Var(_) | Expr::Member { .. }, _) => vec![item.expr.clone()],
            (_, Edge::Any) => wake_sources(&item.expr)
                .into_iter()
                .filter(|src| !is_automatic(src))
                .collect(),
            (expr, edge) => {
                return Err(Error::unsupported(format!(
                    "Event control `@({edge} {expr})`: edges can only be \
                     taken of variables"
                )));
            }
        };
        let edges: &[Edge] = match item.edge {
            Edge::Both => &[Edge::Pos, Edge::Neg],
            Edge::Pos => &[Edge::Pos],
            Edge::Neg => &[Edge::Neg],
            Edge::Any => &[Edge::Any],
        };
        let mut out = vec![];
        for src in &sources {
            for edge in edges {
                let ev = self.event_of(src, *edge, module, comps)?;
                out.push(SenItem::new(Edge::Any, ev));
            }
        }
        Ok(out)
    }
}

impl Visitor for CreateEvents {
    fn finish_timing(
        &mut self,
        s: &mut ir::Timing,
        module: &mut Module,
        comps: &[Module],
    ) -> VisResult {
        let mut sens = Vec::with_capacity(s.sens.len());
        for item in std::mem::take(&mut s.sens) {
            match self.lower_item(item, module, comps) {
                Ok(items) => sens.extend(items),
                Err(e) => self.diag.err(e),
            }
        }
        s.sens = sens;
        Ok(Action::Continue)
    }

    fn finish_wait(
        &mut self,
        s: &mut ir::Wait,
        module: &mut Module,
        comps: &[Module],
    ) -> VisResult {
        let body = std::mem::take(s.body.as_mut());
        let sources = wake_sources(&s.cond);
        if sources.is_empty() {
            if s.cond.as_const() == Some(0) {
                log::warn!(
                    "{}: `wait ({})` can never be satisfied",
                    module.name,
                    s.cond
                );
            }
            return Ok(Action::change(body));
        }

        let (automatic, sources): (Vec<_>, Vec<_>) =
            sources.into_iter().partition(is_automatic);
        if sources.is_empty() {
            log::warn!(
                "{}: `wait ({})` only reads automatic variables and blocks \
                 forever unless it holds when reached",
                module.name,
                s.cond
            );
        } else if !automatic.is_empty() {
            log::debug!(
                "{}: `wait ({})` is not woken by {}",
                module.name,
                s.cond,
                automatic.iter().join(", ")
            );
        }

        let mut sens = Vec::with_capacity(sources.len());
        for src in &sources {
            let ev = if is_event(src) {
                Ok(src.clone())
            } else {
                self.event_of(src, Edge::Any, module, comps)
            };
            match ev {
                Ok(ev) => sens.push(SenItem::new(Edge::Any, ev)),
                Err(e) => self.diag.err(e.with_pos(&s.pos)),
            }
        }
        let lowered = Stmt::while_(
            Expr::lognot(s.cond.clone()),
            Stmt::timing(sens, Stmt::empty()),
        );
        Ok(Action::change(lowered.then(body)))
    }

    fn finish_context(&mut self, ctx: &mut ir::Context) -> StrobeResult<()> {
        self.events.commit(&mut ctx.modules);
        log::info!(
            "{}: {} edge events created",
            Self::name(),
            self.events.created()
        );
        Ok(())
    }
}
