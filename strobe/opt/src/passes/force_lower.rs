use super::add_triggers::edge_cond;
use crate::analysis::ReadWriteSet;
use crate::traversal::{
    Action, ConstructVisitor, DiagnosticContext, DiagnosticPass, Named,
    VisResult, Visitor,
};
use linked_hash_map::LinkedHashMap;
use std::collections::HashMap;
use std::rc::Rc;
use strobe_ir::{
    self as ir, BoolAttr, Builder, Callee, Direction, Edge, Expr, Module,
    ProcessKind, SenItem, Stmt, SyncOp, VarRef, VarType, Variable, RRC,
};
use strobe_utils::{Error, GPosIdx, StrobeResult};

/// One enable and value pair of a forced variable.
struct Pair {
    en: RRC<Variable>,
    val: RRC<Variable>,
}

/// Shadow state of a variable that can be forced.
struct Forced {
    var: RRC<Variable>,
    width: u64,
    /// One pair per `force` statement, in discovery order.
    pairs: Vec<Pair>,
    /// Pair driven from outside of the design.
    external: Option<Pair>,
    /// A combinational process drives the variable.
    comb_driven: bool,
}

impl Forced {
    fn all_pairs(&self) -> impl Iterator<Item = &Pair> {
        self.pairs.iter().chain(self.external.iter())
    }

    /// The variable's stored value, bypassing the force override.
    fn stored(&self) -> Expr {
        Expr::Var(VarRef {
            var: Rc::clone(&self.var),
            no_force: true,
        })
    }

    /// `OR(en_i & val_i) | (~OR(en_i) & stored)`
    fn composition(&self) -> Expr {
        let forced = self
            .all_pairs()
            .map(|p| Expr::and(Expr::var(&p.en), Expr::var(&p.val)))
            .reduce(Expr::or);
        let enabled = self.all_pairs().map(|p| Expr::var(&p.en)).reduce(Expr::or);
        match (forced, enabled) {
            (Some(forced), Some(enabled)) => {
                Expr::or(forced, Expr::and(Expr::not(enabled), self.stored()))
            }
            _ => self.stored(),
        }
    }

    /// `en = en & ~mask`
    fn clear(&self, pair: &Pair, mask: u64) -> Stmt {
        Stmt::assign(
            Expr::var(&pair.en),
            Expr::and(Expr::var(&pair.en), Expr::constant(!mask, self.width)),
        )
    }
}

/// A `force` statement that passed validation.
struct Site {
    var: ir::Id,
    pair: usize,
    lsb: u64,
    width: u64,
}

/// Bits `lsb .. lsb + width` set.
fn range_mask(lsb: u64, width: u64) -> u64 {
    ir::mask(u64::MAX, width).checked_shl(lsb as u32).unwrap_or(0)
}

/// Resize `e` to `width` bits, truncating or zero extending.
fn fit(e: Expr, width: u64) -> Expr {
    let w = e.width();
    match w.cmp(&width) {
        std::cmp::Ordering::Equal => e,
        std::cmp::Ordering::Greater => Expr::slice(e, 0, width),
        std::cmp::Ordering::Less => {
            Expr::Concat(vec![Expr::constant(0, width - w), e])
        }
    }
}

/// `e` placed at bits `lsb .. lsb + width` of a `full` bit value.
fn place(e: Expr, lsb: u64, width: u64, full: u64) -> Expr {
    let high = full.saturating_sub(lsb + width);
    let mut parts = vec![];
    if high > 0 {
        parts.push(Expr::constant(0, high));
    }
    parts.push(fit(e, width));
    if lsb > 0 {
        parts.push(Expr::constant(0, lsb));
    }
    if parts.len() == 1 {
        parts.remove(0)
    } else {
        Expr::Concat(parts)
    }
}

/// Variable and bit range written by the target of a `force` or
/// `release`.
fn force_target(lhs: &Expr) -> StrobeResult<(RRC<Variable>, u64, u64)> {
    let (base, range) = match lhs {
        Expr::Sel { base, lsb, width } => match lsb.as_const() {
            Some(lsb) => (base.as_ref(), Some((lsb, *width))),
            None => {
                return Err(Error::unsupported(format!(
                    "Force of `{lhs}`: non-constant range select"
                )));
            }
        },
        Expr::Slice { base, lsb, width } => (base.as_ref(), Some((*lsb, *width))),
        e => (e, None),
    };
    if lhs.vars().len() > 1 {
        return Err(Error::unsupported(format!(
            "Force of `{lhs}`: multiple variable references"
        )));
    }
    let Expr::Var(vr) = base else {
        return Err(Error::unsupported(format!(
            "Force of `{lhs}`: force on an expression without a variable reference"
        )));
    };
    let var = vr.var.borrow();
    match var.typ {
        VarType::Unpacked { .. } => {
            return Err(Error::unsupported(format!(
                "Forcing unpacked arrays is not supported: `{}`",
                var.name
            )));
        }
        VarType::String => {
            return Err(Error::unsupported(format!(
                "Forcing strings is not permitted: `{}`",
                var.name
            )));
        }
        _ => (),
    }
    if var.is_local() {
        return Err(Error::unsupported(format!(
            "Forcing automatic variable `{}`",
            var.name
        )));
    }
    let (lsb, width) = range.unwrap_or((0, var.width()));
    Ok((Rc::clone(&vr.var), lsb, width))
}

/// Replacement for reads of forced variables, keyed by variable name.
type Compositions = HashMap<ir::Id, (RRC<Variable>, Expr)>;

fn rewrite_read(e: &mut Expr, comps: &Compositions) {
    e.replace(&mut |x| match x {
        Expr::Var(vr) if !vr.no_force => comps
            .get(&vr.name())
            .filter(|(v, _)| Rc::ptr_eq(v, &vr.var))
            .map(|(_, c)| c.clone()),
        _ => None,
    });
}

/// Rewrite the reads inside an lvalue, leaving the written variable alone.
fn rewrite_lvalue(e: &mut Expr, comps: &Compositions) {
    match e {
        Expr::Sel { base, lsb, .. } => {
            rewrite_lvalue(base, comps);
            rewrite_read(lsb, comps);
        }
        Expr::Slice { base, .. } => rewrite_lvalue(base, comps),
        Expr::Member { obj, .. } => rewrite_read(obj, comps),
        Expr::Concat(es) => es.iter_mut().for_each(|e| rewrite_lvalue(e, comps)),
        _ => (),
    }
}

/// Lowers `force` and `release` onto enable and value shadow variables.
///
/// Every `force v = e` statement owns a pair `__VforceEn<i>__v`,
/// `__VforceRhs<i>__v`. Executing the force enables its bits and evicts
/// every other pair of `v` from those bits. Every read of `v` is replaced by
/// ```text
/// (en_0 & rhs_0) | (en_1 & rhs_1) | ... | (~(en_0 | en_1 | ...) & v)
/// ```
/// so the most recent force of a bit wins and unforced bits show the
/// stored value. `release` stores the current value into `v`, unless a
/// combinational process drives `v`, and disables the released bits.
///
/// A `force` or `release` that changes what readers of `v` see fires the
/// edge events of `v`. Sensitivity lists naming `v` observe
/// `__VforceRd__v`, which a continuous process keeps equal to the
/// composition.
///
/// Variables with the `forceable` attribute additionally get a public pair
/// `__VforceEn__v` / `__VforceVal__v` driven from outside of the design.
pub struct ForceLower {
    diag: DiagnosticContext,
    forced: LinkedHashMap<ir::Id, Forced>,
    /// Force statements of the module in traversal order.
    sites: Vec<Option<Site>>,
    /// Index of the next force statement the traversal reaches.
    next: usize,
    /// Task or process whose body is being visited.
    unit: ir::Id,
}

impl Named for ForceLower {
    fn name() -> &'static str {
        "force-lower"
    }

    fn description() -> &'static str {
        "Lower force and release onto enable/value shadow variables"
    }
}

impl ConstructVisitor for ForceLower {
    fn from(_ctx: &ir::Context) -> StrobeResult<Self> {
        Ok(ForceLower {
            diag: DiagnosticContext::default(),
            forced: LinkedHashMap::new(),
            sites: vec![],
            next: 0,
            unit: ir::Id::default(),
        })
    }

    fn clear_data(&mut self) {
        self.forced = LinkedHashMap::new();
        self.sites.clear();
        self.next = 0;
    }
}

impl DiagnosticPass for ForceLower {
    fn diagnostics(&self) -> &DiagnosticContext {
        &self.diag
    }
}

impl ForceLower {
    fn shadow_var(module: &mut Module, name: ir::Id, width: u64) -> RRC<Variable> {
        let var = Builder::new(module).add_named_var(name, VarType::Logic { width });
        var.borrow_mut().init = Some(0);
        var
    }

    fn state_of<'a>(
        forced: &'a mut LinkedHashMap<ir::Id, Forced>,
        module: &Module,
        var: &RRC<Variable>,
    ) -> &'a mut Forced {
        let (name, width) = {
            let v = var.borrow();
            (v.name, v.width())
        };
        forced.entry(name).or_insert_with(|| {
            let comb_driven = module.processes.iter().any(|p| {
                let p = p.borrow();
                p.is_combinational()
                    && ReadWriteSet::write_set(&p.body)
                        .iter()
                        .any(|w| Rc::ptr_eq(w, var))
            });
            Forced {
                var: Rc::clone(var),
                width,
                pairs: vec![],
                external: None,
                comb_driven,
            }
        })
    }

    /// Register the pair of a `force` statement.
    fn discover(
        &mut self,
        module: &mut Module,
        lhs: &Expr,
        rhs: &Expr,
    ) -> StrobeResult<Site> {
        let (var, lsb, width) = force_target(lhs)?;
        let name = var.borrow().name;
        let state = Self::state_of(&mut self.forced, module, &var);
        let full = state.width;
        let pair = state.pairs.len();
        let en_name = module.generate_numbered("__VforceEn", format!("__{name}"));
        let val_name = module.generate_numbered("__VforceRhs", format!("__{name}"));
        let en = Self::shadow_var(module, en_name, full);
        let val = Self::shadow_var(module, val_name, full);

        // Keep the value of the force up to date with what it reads.
        let reads = rhs.vars();
        if !reads.is_empty()
            && !rhs.has_member()
            && reads.iter().all(|v| !v.var.borrow().is_local())
        {
            Builder::new(module).add_process(
                format!("__VforceDrive__{name}"),
                ProcessKind::Continuous,
                Stmt::assign(Expr::var(&val), place(rhs.clone(), lsb, width, full)),
            );
        }

        let state = Self::state_of(&mut self.forced, module, &var);
        state.pairs.push(Pair { en, val });
        Ok(Site {
            var: name,
            pair,
            lsb,
            width,
        })
    }

    /// `change` followed by firing the edge events of `var` whose edge it
    /// caused. Reads of `var` here are turned into the composition later.
    fn with_edge_events(
        module: &mut Module,
        unit: ir::Id,
        var: &RRC<Variable>,
        change: Vec<Stmt>,
    ) -> StrobeResult<Stmt> {
        let (name, width, events) = {
            let v = var.borrow();
            (v.name, v.width(), v.edge_events.clone())
        };
        if events.is_empty() {
            return Ok(Stmt::seq(change));
        }
        let prev_name = module.generate_numbered("__Vprevval", format!("__{name}"));
        let prev = Builder::new(module).add_named_local(
            prev_name,
            VarType::Logic { width },
            unit,
        );
        let mut stmts = vec![Stmt::assign(Expr::var(&prev), Expr::var(var))];
        stmts.extend(change);
        for (edge, id) in events {
            let ev = module.find_var(id).ok_or_else(|| {
                Error::malformed_structure(format!(
                    "Edge event `{id}` of `{name}` is not defined"
                ))
            })?;
            stmts.push(Stmt::if_(
                edge_cond(edge, Expr::var(&prev), Expr::var(var)),
                Stmt::fire(Expr::var(&ev)),
                Stmt::empty(),
            ));
        }
        Ok(Stmt::seq(stmts))
    }

    /// Point sensitivity lists at the forced value of the variables they
    /// name.
    fn observe_forced(&self, module: &mut Module) {
        let sensed: Vec<(RRC<Variable>, u64)> = self
            .forced
            .values()
            .filter(|st| {
                module.processes.iter().any(|p| {
                    p.borrow().sens().is_some_and(|sens| {
                        sens.iter().any(|item| {
                            matches!(&item.expr, Expr::Var(vr) if Rc::ptr_eq(&vr.var, &st.var))
                        })
                    })
                })
            })
            .map(|st| (Rc::clone(&st.var), st.width))
            .collect();

        for (var, width) in sensed {
            let (name, init) = {
                let v = var.borrow();
                (v.name, v.init)
            };
            let rd = Self::shadow_var(module, format!("__VforceRd__{name}").into(), width);
            rd.borrow_mut().init = init;
            for p in module.processes.iter() {
                let mut p = p.borrow_mut();
                if let ProcessKind::Always(Some(sens)) = &mut p.kind {
                    for item in sens.iter_mut() {
                        if matches!(&item.expr, Expr::Var(vr) if Rc::ptr_eq(&vr.var, &var)) {
                            item.expr = Expr::var(&rd);
                        }
                    }
                }
            }
            Builder::new(module).add_process(
                format!("__VforceRead__{name}"),
                ProcessKind::Continuous,
                Stmt::assign(Expr::var(&rd), Expr::var(&var)),
            );
        }
    }

    /// Public pair and republishing process of a `forceable` variable.
    fn add_external(&mut self, module: &mut Module, var: &RRC<Variable>) {
        let name = var.borrow().name;
        let width = Self::state_of(&mut self.forced, module, var).width;
        let en = Self::shadow_var(module, format!("__VforceEn__{name}").into(), width);
        let val = Self::shadow_var(module, format!("__VforceVal__{name}").into(), width);
        for v in [&en, &val] {
            v.borrow_mut().attributes.insert(BoolAttr::Public);
        }
        let sens = vec![
            SenItem::new(Edge::Any, Expr::var(&en)),
            SenItem::new(Edge::Any, Expr::var(&val)),
        ];
        let state = Self::state_of(&mut self.forced, module, var);
        state.external = Some(Pair { en, val });
        let body = Stmt::assign(state.stored(), state.composition());
        Builder::new(module).add_process(
            format!("__VforceExt__{name}"),
            ProcessKind::Always(Some(sens)),
            body,
        );
    }
}

impl Visitor for ForceLower {
    fn start(&mut self, module: &mut Module, _comps: &[Module]) -> VisResult {
        let mut forces: Vec<(Expr, Expr, GPosIdx)> = vec![];
        let mut has_release = false;
        let mut collect = |s: &Stmt| match s {
            Stmt::Force(f) => forces.push((f.lhs.clone(), f.rhs.clone(), f.pos)),
            Stmt::Release(_) => has_release = true,
            _ => (),
        };
        for t in module.tasks.iter() {
            t.borrow().body.walk(&mut collect);
        }
        for p in module.processes.iter() {
            p.borrow().body.walk(&mut collect);
        }
        let forceable: Vec<RRC<Variable>> = module
            .vars
            .iter()
            .filter(|v| v.borrow().attributes.has(BoolAttr::Forceable))
            .cloned()
            .collect();
        if forces.is_empty() && forceable.is_empty() && !has_release {
            return Ok(Action::Stop);
        }

        for (lhs, rhs, pos) in forces {
            match self.discover(module, &lhs, &rhs) {
                Ok(site) => self.sites.push(Some(site)),
                Err(e) => {
                    self.diag.err(e.with_pos(&pos));
                    self.sites.push(None);
                }
            }
        }
        for var in &forceable {
            self.add_external(module, var);
        }
        Ok(Action::Continue)
    }

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
        self.unit = proc.name;
        Ok(Action::Continue)
    }

    fn force(
        &mut self,
        s: &mut ir::Force,
        module: &mut Module,
        _comps: &[Module],
    ) -> VisResult {
        let idx = self.next;
        self.next += 1;
        let Some(Some(site)) = self.sites.get(idx) else {
            return Ok(Action::Continue);
        };
        let Some(state) = self.forced.get(&site.var) else {
            return Ok(Action::Continue);
        };
        let var = Rc::clone(&state.var);
        let mask = range_mask(site.lsb, site.width);
        let pair = &state.pairs[site.pair];
        let mut stmts = vec![
            Stmt::assign(
                Expr::var(&pair.val),
                place(s.rhs.clone(), site.lsb, site.width, state.width),
            ),
            Stmt::assign(Expr::var(&pair.en), Expr::constant(mask, state.width)),
        ];
        stmts.extend(
            state
                .all_pairs()
                .enumerate()
                .filter(|(j, _)| *j != site.pair)
                .map(|(_, other)| state.clear(other, mask)),
        );
        match Self::with_edge_events(module, self.unit, &var, stmts) {
            Ok(lowered) => Ok(Action::change(lowered)),
            Err(e) => self.diag.early_return_err(e.with_pos(&s.pos)),
        }
    }

    fn release(
        &mut self,
        s: &mut ir::Release,
        module: &mut Module,
        _comps: &[Module],
    ) -> VisResult {
        let (var, lsb, width) = match force_target(&s.lhs) {
            Ok(target) => target,
            Err(e) => return self.diag.early_return_err(e.with_pos(&s.pos)),
        };
        let name = var.borrow().name;
        let Some(state) = self.forced.get(&name).filter(|st| !st.pairs.is_empty())
        else {
            // Nothing inside the design forces it.
            return Ok(Action::change(Stmt::empty()));
        };
        let mask = range_mask(lsb, width);
        let mut stmts = vec![];
        if !state.comb_driven {
            let (lhs, rhs) = if lsb == 0 && width == state.width {
                (state.stored(), state.composition())
            } else {
                (
                    Expr::slice(state.stored(), lsb, width),
                    Expr::slice(state.composition(), lsb, width),
                )
            };
            stmts.push(Stmt::assign(lhs, rhs));
        }
        stmts.extend(state.pairs.iter().map(|p| state.clear(p, mask)));
        match Self::with_edge_events(module, self.unit, &var, stmts) {
            Ok(lowered) => Ok(Action::change(lowered)),
            Err(e) => self.diag.early_return_err(e.with_pos(&s.pos)),
        }
    }

    fn finish(&mut self, module: &mut Module, _comps: &[Module]) -> VisResult {
        if self.forced.is_empty() {
            return Ok(Action::Continue);
        }
        self.observe_forced(module);
        let comps: Compositions = self
            .forced
            .iter()
            .map(|(name, st)| (*name, (Rc::clone(&st.var), st.composition())))
            .collect();
        let directions: HashMap<ir::Id, Vec<Direction>> = module
            .tasks
            .iter()
            .map(|t| {
                let t = t.borrow();
                (t.name, t.args.iter().map(|a| a.borrow().direction).collect())
            })
            .collect();

        let mut errors = vec![];
        let mut rewrite = |body: &mut Stmt| {
            body.walk_mut(&mut |s| match s {
                Stmt::Assign(a) => {
                    rewrite_lvalue(&mut a.lhs, &comps);
                    rewrite_read(&mut a.rhs, &comps);
                    a.delay.iter_mut().for_each(|d| rewrite_read(d, &comps));
                }
                Stmt::Call(c) => {
                    if let Callee::Task(name) = &c.callee {
                        let dirs = directions.get(name).map(Vec::as_slice).unwrap_or(&[]);
                        for (arg, dir) in c.args.iter().zip(dirs) {
                            let by_ref = matches!(dir, Direction::Output | Direction::Inout);
                            if let Some(vr) = arg.target_var().filter(|_| by_ref) {
                                if comps.contains_key(&vr.name()) {
                                    errors.push(Error::unsupported(format!(
                                        "Read-write reference to forced variable `{}` in call of `{name}`",
                                        vr.name()
                                    )));
                                }
                            }
                        }
                    }
                    c.args.iter_mut().for_each(|a| rewrite_read(a, &comps));
                    if let Callee::Method { obj, .. } = &mut c.callee {
                        rewrite_read(obj, &comps);
                    }
                    if let Some(ret) = &mut c.ret {
                        rewrite_lvalue(ret, &comps);
                    }
                }
                Stmt::Force(f) => rewrite_read(&mut f.rhs, &comps),
                Stmt::Release(_) => (),
                Stmt::Sync(sync) => rewrite_sync(sync, &comps),
                s => s.exprs_mut().into_iter().for_each(|e| rewrite_read(e, &comps)),
            });
        };
        for t in module.tasks.iter() {
            rewrite(&mut t.borrow_mut().body);
        }
        for p in module.processes.iter() {
            rewrite(&mut p.borrow_mut().body);
        }
        for e in errors {
            self.diag.err(e);
        }
        log::info!(
            "{}: {} forced variables, {} force statements",
            module.name,
            self.forced.len(),
            self.sites.len()
        );
        Ok(Action::Continue)
    }
}

fn rewrite_sync(sync: &mut ir::Sync, comps: &Compositions) {
    match &mut sync.op {
        SyncOp::SemGet { sem, keys } | SyncOp::SemPut { sem, keys } => {
            rewrite_read(sem, comps);
            rewrite_read(keys, comps);
        }
        SyncOp::ProcKill(h) | SyncOp::ProcAwait(h) => rewrite_read(h, comps),
        SyncOp::ProcSelf { target } => rewrite_lvalue(target, comps),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::{ModuleKind, Process, Task, TaskKind};

    fn run(top: Module) -> (ir::Context, ForceLower) {
        let mut ctx = ir::Context::new(vec![top], "top");
        let pass = ForceLower::do_pass_default(&mut ctx).unwrap();
        (ctx, pass)
    }

    fn body_of(ctx: &ir::Context, proc: &str) -> String {
        let p = ctx.entrypoint().unwrap().find_process(proc).unwrap();
        let text = ir::Printer::stmt_to_str(&p.borrow().body);
        text
    }

    #[test]
    fn later_forces_evict_overlapping_bits() {
        let mut top = Module::new("top", ModuleKind::Design);
        let v = top.add_var(Variable::logic("v", 4));
        let out = top.add_var(Variable::logic("out", 4));
        top.add_process(Process::new(
            "p",
            ProcessKind::Initial,
            Stmt::seq(vec![
                Stmt::force(Expr::var(&v), Expr::constant(0b1010, 4)),
                Stmt::force(Expr::slice(Expr::var(&v), 0, 2), Expr::constant(0b01, 2)),
            ]),
        ));
        top.add_process(Process::new(
            "read",
            ProcessKind::Continuous,
            Stmt::assign(Expr::var(&out), Expr::var(&v)),
        ));
        let (ctx, pass) = run(top);
        assert!(!pass.diagnostics().has_errors());
        let text = body_of(&ctx, "p");
        assert!(text.contains("__VforceRhs0__v = 4'd10;"));
        assert!(text.contains("__VforceEn0__v = 4'd15;"));
        assert!(text.contains("__VforceEn1__v = (__VforceEn1__v & 4'd0);"));
        assert!(text.contains("__VforceRhs1__v = {2'd0, 2'd1};"));
        assert!(text.contains("__VforceEn1__v = 4'd3;"));
        assert!(text.contains("__VforceEn0__v = (__VforceEn0__v & 4'd12);"));
        assert_eq!(
            body_of(&ctx, "read"),
            "out = (((__VforceEn0__v & __VforceRhs0__v) | (__VforceEn1__v & __VforceRhs1__v)) \
             | (~(__VforceEn0__v | __VforceEn1__v) & v));\n"
        );
        let en = ctx.entrypoint().unwrap().find_var("__VforceEn0__v").unwrap();
        assert_eq!(en.borrow().init, Some(0));
    }

    #[test]
    fn release_freezes_and_disables() {
        let mut top = Module::new("top", ModuleKind::Design);
        let v = top.add_var(Variable::logic("v", 2));
        let a = top.add_var(Variable::logic("a", 2));
        top.add_process(Process::new(
            "p",
            ProcessKind::Initial,
            Stmt::seq(vec![
                Stmt::force(Expr::var(&v), Expr::var(&a)),
                Stmt::release(Expr::var(&v)),
            ]),
        ));
        let (ctx, _) = run(top);
        let text = body_of(&ctx, "p");
        assert!(text.contains(
            "v = ((__VforceEn0__v & __VforceRhs0__v) | (~__VforceEn0__v & v));"
        ));
        assert!(text.contains("__VforceEn0__v = (__VforceEn0__v & 2'd0);"));
        // The forced value follows `a`.
        let drive = ctx.entrypoint().unwrap().find_process("__VforceDrive__v").unwrap();
        assert_eq!(
            ir::Printer::stmt_to_str(&drive.borrow().body),
            "__VforceRhs0__v = a;\n"
        );
    }

    #[test]
    fn forcing_a_clock_fires_its_edges() {
        let mut top = Module::new("top", ModuleKind::Design);
        let clk = top.add_var(Variable::logic("clk", 1));
        let q = top.add_var(Variable::logic("q", 1));
        let ev = top.add_var(Variable::new("__VedgeEvent__posedge__clk", VarType::Event));
        clk.borrow_mut().edge_events.push((Edge::Pos, ev.borrow().name));
        top.add_process(Process::new(
            "ff",
            ProcessKind::Always(Some(vec![SenItem::new(Edge::Pos, Expr::var(&clk))])),
            Stmt::nba(Expr::var(&q), Expr::one()),
        ));
        top.add_process(Process::new(
            "p",
            ProcessKind::Initial,
            Stmt::seq(vec![
                Stmt::force(Expr::var(&clk), Expr::one()),
                Stmt::release(Expr::var(&clk)),
            ]),
        ));
        let (ctx, pass) = run(top);
        assert!(!pass.diagnostics().has_errors());
        let comp = "((__VforceEn0__clk & __VforceRhs0__clk) | (~__VforceEn0__clk & clk))";
        let text = body_of(&ctx, "p");
        assert!(text.contains(&format!("__Vprevval0__clk = {comp};")));
        assert!(text.contains(&format!("__Vprevval1__clk = {comp};")));
        assert_eq!(text.matches("-> __VedgeEvent__posedge__clk;").count(), 2);

        let top = ctx.entrypoint().unwrap();
        let ff = top.find_process("ff").unwrap();
        let sens = ff.borrow().sens().cloned().unwrap();
        assert_eq!(ir::Printer::expr_to_str(&sens[0].expr), "__VforceRd__clk");
        assert_eq!(body_of(&ctx, "__VforceRead__clk"), format!("__VforceRd__clk = {comp};\n"));
    }

    #[test]
    fn release_twice_keeps_the_released_value() {
        let mut top = Module::new("top", ModuleKind::Design);
        let v = top.add_var(Variable::logic("v", 2));
        top.add_process(Process::new(
            "p",
            ProcessKind::Initial,
            Stmt::seq(vec![
                Stmt::force(Expr::var(&v), Expr::constant(2, 2)),
                Stmt::release(Expr::var(&v)),
                Stmt::release(Expr::var(&v)),
            ]),
        ));
        let (ctx, pass) = run(top);
        assert!(!pass.diagnostics().has_errors());
        let text = body_of(&ctx, "p");
        // With the enable cleared the second store writes `v` back to itself.
        let store = "v = ((__VforceEn0__v & __VforceRhs0__v) | (~__VforceEn0__v & v));";
        assert_eq!(text.matches(store).count(), 2);
        assert_eq!(
            text.matches("__VforceEn0__v = (__VforceEn0__v & 2'd0);").count(),
            2
        );
    }

    #[test]
    fn release_without_force_is_a_no_op() {
        let mut top = Module::new("top", ModuleKind::Design);
        let v = top.add_var(Variable::logic("v", 2));
        top.add_process(Process::new(
            "p",
            ProcessKind::Initial,
            Stmt::release(Expr::var(&v)),
        ));
        let (ctx, _) = run(top);
        assert_eq!(body_of(&ctx, "p"), ";\n");
    }

    #[test]
    fn unsupported_targets() {
        let mut top = Module::new("top", ModuleKind::Design);
        let v = top.add_var(Variable::logic("v", 4));
        let i = top.add_var(Variable::logic("i", 2));
        let w = top.add_var(Variable::logic("w", 4));
        let arr = top.add_var(Variable::new(
            "arr",
            VarType::Unpacked { width: 4, len: 2 },
        ));
        let s = top.add_var(Variable::new("s", VarType::String));
        top.add_process(Process::new(
            "p",
            ProcessKind::Initial,
            Stmt::seq(vec![
                Stmt::force(Expr::sel(Expr::var(&v), Expr::var(&i), 1), Expr::one()),
                Stmt::force(
                    Expr::Concat(vec![Expr::var(&v), Expr::var(&w)]),
                    Expr::constant(0, 8),
                ),
                Stmt::force(Expr::var(&arr), Expr::constant(0, 4)),
                Stmt::force(Expr::var(&s), Expr::constant(0, 1)),
            ]),
        ));
        let (_, pass) = run(top);
        let msgs: Vec<_> = pass
            .diagnostics()
            .errors_iter()
            .map(|e| e.message())
            .collect();
        assert_eq!(msgs.len(), 4);
        assert!(msgs[0].contains("non-constant range select"));
        assert!(msgs[1].contains("multiple variable references"));
        assert!(msgs[2].contains("unpacked arrays"));
        assert!(msgs[3].contains("strings"));
    }

    #[test]
    fn forceable_variables_get_public_controls() {
        let mut top = Module::new("top", ModuleKind::Design);
        top.add_var(Variable::logic("v", 8).with_attr(BoolAttr::Forceable));
        let (ctx, _) = run(top);
        let top = ctx.entrypoint().unwrap();
        for name in ["__VforceEn__v", "__VforceVal__v"] {
            let var = top.find_var(name).unwrap();
            assert!(var.borrow().attributes.has(BoolAttr::Public));
        }
        let ext = top.find_process("__VforceExt__v").unwrap();
        assert_eq!(ext.borrow().sens().map(Vec::len), Some(2));
        assert_eq!(
            ir::Printer::stmt_to_str(&ext.borrow().body),
            "v = ((__VforceEn__v & __VforceVal__v) | (~__VforceEn__v & v));\n"
        );
    }

    #[test]
    fn forced_variables_cannot_be_passed_by_reference() {
        let mut top = Module::new("top", ModuleKind::Design);
        let v = top.add_var(Variable::logic("v", 1));
        let o = top.add_var(
            Variable::logic("o", 1)
                .with_direction(Direction::Output)
                .with_scope(ir::Scope::Local("t".into())),
        );
        let mut t = Task::new("t", TaskKind::Task, Stmt::empty());
        t.args = vec![o];
        top.add_task(t);
        top.add_process(Process::new(
            "p",
            ProcessKind::Initial,
            Stmt::seq(vec![
                Stmt::force(Expr::var(&v), Expr::one()),
                Stmt::call("t", vec![Expr::var(&v)]),
            ]),
        ));
        let (_, pass) = run(top);
        let errs: Vec<_> = pass.diagnostics().errors_iter().collect();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message().contains("Read-write reference"));
    }
}
