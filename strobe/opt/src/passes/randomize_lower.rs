use crate::analysis::static_class;
use crate::traversal::{
    Action, ConstructVisitor, Named, ParseVal, PassOpt, VisResult, Visitor,
};
use linked_hash_map::LinkedHashMap;
use strobe_ir::{
    self as ir, BinOp, BoolAttr, Builder, Callee, ConstraintItem, Expr,
    Module, Stmt, TaskKind, VarType, Variable, HANDLE_WIDTH, RRC,
};
use strobe_utils::StrobeResult;

/// Name of the synthesized randomization method.
pub const RANDOMIZE: &str = "randomize";
/// Name of the function that drops one soft constraint.
pub const RELAX_NEXT: &str = "relax_next";

/// Synthesizes `randomize()` for every class that needs it.
///
/// A class needs `randomize()` if it is called on a handle of the class, if
/// it derives from such a class, or if it is the class of a `rand` member of
/// such a class. The generated function draws every `rand` member of the
/// class chain until all constraints hold, giving up after `attempts` draws:
/// ```text
/// function randomize();
///   __Vsoft0__C = 1; ...
///   randomize = 0; relaxed = 1;
///   while (randomize == 0 && relaxed) begin
///     tries = 0;
///     while (randomize == 0 && tries < attempts) begin
///       x = $urandom; e = $urandom_choice(...); subok = 1;
///       if (subok && h != null) subok = h.randomize();
///       if (hard && (!__Vsoft0__C || soft0) && subok) randomize = 1;
///       else tries = tries + 1;
///     end
///     if (randomize == 0) relaxed = relax_next();
///   end
/// endfunction
/// ```
/// `relax_next()` clears the first soft constraint control that is still
/// set and returns whether it found one.
pub struct RandomizeLower {
    attempts: u64,
}

impl Named for RandomizeLower {
    fn name() -> &'static str {
        "randomize-lower"
    }

    fn description() -> &'static str {
        "Synthesize randomize() for classes with rand members and constraints"
    }

    fn opts() -> Vec<PassOpt> {
        vec![PassOpt::new(
            "attempts",
            "Draws per relaxation level before a soft constraint is dropped",
            ParseVal::Num(64),
            PassOpt::parse_num,
        )]
    }
}

impl ConstructVisitor for RandomizeLower {
    fn from(ctx: &ir::Context) -> StrobeResult<Self> {
        let opts = Self::get_opts(ctx);
        Ok(RandomizeLower {
            attempts: opts["attempts"].pos_num().unwrap_or(64).max(1),
        })
    }

    fn clear_data(&mut self) {}
}

/// What `randomize()` of one class works on.
struct ClassInfo {
    /// `rand` members of the class chain, base class members first.
    fields: Vec<RRC<Variable>>,
    /// Constraint items of the class chain.
    items: Vec<ConstraintItem>,
}

impl RandomizeLower {
    /// Classes on which `randomize()` is called directly.
    fn receivers(modules: &[Module]) -> Vec<ir::Id> {
        let mut out = vec![];
        let mut visit = |body: &Stmt| {
            body.walk(&mut |s| {
                if let Stmt::Call(ir::Call {
                    callee: Callee::Method { obj, name },
                    ..
                }) = s
                {
                    if *name == RANDOMIZE {
                        out.extend(static_class(obj));
                    }
                }
            })
        };
        for m in modules {
            m.tasks.iter().for_each(|t| visit(&t.borrow().body));
            m.processes.iter().for_each(|p| visit(&p.borrow().body));
        }
        out
    }

    /// Every class that needs `randomize()`, in discovery order.
    fn classes(modules: &[Module]) -> Vec<ir::Id> {
        let mut set: LinkedHashMap<ir::Id, ()> = LinkedHashMap::new();
        let mut work = Self::receivers(modules);
        while let Some(class) = work.pop() {
            if set.contains_key(&class)
                || !ir::find_module(modules, class).is_some_and(Module::is_class)
            {
                continue;
            }
            set.insert(class, ());
            work.extend(ir::subclasses(modules, class));
            work.extend(
                ir::all_fields(modules, class)
                    .iter()
                    .filter(|f| f.borrow().attributes.has(BoolAttr::Rand))
                    .filter_map(|f| f.borrow().typ.class_name()),
            );
        }
        set.into_iter().map(|(c, _)| c).collect()
    }

    fn info(modules: &[Module], class: ir::Id) -> ClassInfo {
        let fields = ir::all_fields(modules, class)
            .into_iter()
            .filter(|f| f.borrow().attributes.has(BoolAttr::Rand))
            .collect();
        let mut chain = ir::class_chain(modules, class);
        chain.reverse();
        let items = chain
            .into_iter()
            .filter_map(|c| ir::find_module(modules, c))
            .flat_map(|m| m.constraints.iter().flat_map(|c| c.items.clone()))
            .collect();
        ClassInfo { fields, items }
    }

    /// `relax_next()`: clear the first soft control that is set.
    fn relax_next(module: &mut Module, controls: &[RRC<Variable>]) -> ir::Id {
        let mut b = Builder::new(module);
        let ret = b.add_local("__Vrelaxed", VarType::Logic { width: 1 }, RELAX_NEXT.into());
        let body = controls.iter().rev().fold(
            Stmt::assign(Expr::var(&ret), Expr::zero()),
            |rest, ctl| {
                Stmt::if_(
                    Expr::var(ctl),
                    Stmt::seq(vec![
                        Stmt::assign(Expr::var(ctl), Expr::zero()),
                        Stmt::assign(Expr::var(&ret), Expr::one()),
                    ]),
                    rest,
                )
            },
        );
        let task = b.add_task(RELAX_NEXT.into(), TaskKind::Function, vec![], body);
        task.borrow_mut().ret = Some(ret);
        RELAX_NEXT.into()
    }

    /// One draw of every `rand` member, leaving `subok` clear if a
    /// member object failed to randomize.
    fn draw(fields: &[RRC<Variable>], subok: &RRC<Variable>) -> Vec<Stmt> {
        let mut stmts = vec![Stmt::assign(Expr::var(subok), Expr::one())];
        for f in fields {
            let typ = f.borrow().typ.clone();
            match typ {
                VarType::Logic { width } => stmts.push(Stmt::assign(
                    Expr::var(f),
                    Expr::Random { width, choices: None },
                )),
                VarType::Enum { width, values } => stmts.push(Stmt::assign(
                    Expr::var(f),
                    Expr::Random {
                        width,
                        choices: Some(values),
                    },
                )),
                VarType::Class(_) => {
                    let mut call = Stmt::method_call(Expr::var(f), RANDOMIZE, vec![]);
                    if let Stmt::Call(c) = &mut call {
                        c.ret = Some(Expr::var(subok));
                    }
                    let live = Expr::neq(Expr::var(f), Expr::constant(0, HANDLE_WIDTH));
                    stmts.push(Stmt::if_(
                        Expr::log_and(Expr::var(subok), live),
                        call,
                        Stmt::empty(),
                    ));
                }
                typ => log::warn!(
                    "rand member `{}` of type {typ:?} is not randomized",
                    f.borrow().name
                ),
            }
        }
        stmts
    }

    fn synthesize(&self, module: &mut Module, info: ClassInfo) {
        let class = module.name;
        let soft: Vec<_> = info.items.iter().filter(|i| i.soft).collect();
        let controls: Vec<RRC<Variable>> = soft
            .iter()
            .map(|_| {
                let name = module.generate_numbered("__Vsoft", format!("__{class}"));
                let ctl = Builder::new(module).add_named_var(name, VarType::Logic { width: 1 });
                ctl.borrow_mut().init = Some(1);
                ctl
            })
            .collect();
        let relax = Self::relax_next(module, &controls);

        let unit: ir::Id = RANDOMIZE.into();
        let mut b = Builder::new(module);
        let logic = |width| VarType::Logic { width };
        let ret = b.add_local("__Vrandomized", logic(1), unit);
        let tries = b.add_local("__Vtries", logic(32), unit);
        let relaxed = b.add_local("__Vrelaxing", logic(1), unit);
        let subok = b.add_local("__Vsubok", logic(1), unit);

        let satisfied = info
            .items
            .iter()
            .filter(|i| !i.soft)
            .map(|i| i.cond.clone())
            .chain(soft.iter().zip(&controls).map(|(item, ctl)| {
                Expr::log_or(Expr::lognot(Expr::var(ctl)), item.cond.clone())
            }))
            .chain(std::iter::once(Expr::var(&subok)))
            .reduce(Expr::log_and)
            .unwrap_or_else(Expr::one);

        let not_done = |extra: Expr| {
            Expr::log_and(Expr::eq(Expr::var(&ret), Expr::zero()), extra)
        };
        let mut attempt = Self::draw(&info.fields, &subok);
        attempt.push(Stmt::if_(
            satisfied,
            Stmt::assign(Expr::var(&ret), Expr::one()),
            Stmt::assign(
                Expr::var(&tries),
                Expr::binary(BinOp::Add, Expr::var(&tries), Expr::constant(1, 32)),
            ),
        ));
        let mut relax_call = Stmt::call(relax, vec![]);
        if let Stmt::Call(c) = &mut relax_call {
            c.ret = Some(Expr::var(&relaxed));
        }
        let level = Stmt::seq(vec![
            Stmt::assign(Expr::var(&tries), Expr::constant(0, 32)),
            Stmt::while_(
                not_done(Expr::binary(
                    BinOp::Lt,
                    Expr::var(&tries),
                    Expr::constant(self.attempts, 32),
                )),
                Stmt::seq(attempt),
            ),
            Stmt::if_(
                Expr::eq(Expr::var(&ret), Expr::zero()),
                relax_call,
                Stmt::empty(),
            ),
        ]);

        let mut body: Vec<Stmt> = controls
            .iter()
            .map(|ctl| Stmt::assign(Expr::var(ctl), Expr::one()))
            .collect();
        body.extend([
            Stmt::assign(Expr::var(&ret), Expr::zero()),
            Stmt::assign(Expr::var(&relaxed), Expr::one()),
            Stmt::while_(not_done(Expr::var(&relaxed)), level),
        ]);
        let task = b.add_task(unit, TaskKind::Function, vec![], Stmt::seq(body));
        let mut task = task.borrow_mut();
        task.ret = Some(ret);
        task.is_virtual = true;
        log::debug!(
            "{class}: randomize() over {} members, {} constraints ({} soft)",
            info.fields.len(),
            info.items.len(),
            controls.len()
        );
    }
}

impl Visitor for RandomizeLower {
    fn start_context(&mut self, ctx: &mut ir::Context) -> StrobeResult<()> {
        let classes = Self::classes(&ctx.modules);
        let mut synthesized = 0;
        for class in classes {
            let info = Self::info(&ctx.modules, class);
            let Some(module) = ctx.modules.iter_mut().find(|m| m.name == class)
            else {
                continue;
            };
            if module.find_task(RANDOMIZE).is_some() {
                continue;
            }
            self.synthesize(module, info);
            synthesized += 1;
        }
        if synthesized > 0 {
            log::info!("{}: synthesized randomize() for {synthesized} classes", Self::name());
        }
        Ok(())
    }

    fn start(&mut self, _module: &mut Module, _comps: &[Module]) -> VisResult {
        Ok(Action::Stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::{Constraint, ModuleKind, Process, ProcessKind};

    fn class(name: &str, extends: Option<&str>) -> Module {
        Module::new(
            name,
            ModuleKind::Class {
                extends: extends.map(ir::Id::from),
            },
        )
    }

    fn top_calling(class: &str) -> Module {
        let mut top = Module::new("top", ModuleKind::Design);
        let h = top.add_var(Variable::new("h", VarType::Class(class.into())));
        let ok = top.add_var(Variable::logic("ok", 1));
        let mut call = Stmt::method_call(Expr::var(&h), RANDOMIZE, vec![]);
        if let Stmt::Call(c) = &mut call {
            c.ret = Some(Expr::var(&ok));
        }
        top.add_process(Process::new("p", ProcessKind::Initial, call));
        top
    }

    #[test]
    fn randomize_draws_members_and_checks_constraints() {
        let mut c = class("C", None);
        let x = c.add_var(Variable::logic("x", 4).with_attr(BoolAttr::Rand));
        c.add_var(
            Variable::new(
                "e",
                VarType::Enum {
                    width: 2,
                    values: vec![1, 2],
                },
            )
            .with_attr(BoolAttr::Rand),
        );
        c.add_var(Variable::logic("plain", 4));
        c.constraints.push(Constraint {
            name: "c".into(),
            items: vec![
                ConstraintItem {
                    cond: Expr::binary(BinOp::Lt, Expr::var(&x), Expr::constant(10, 4)),
                    soft: false,
                },
                ConstraintItem {
                    cond: Expr::eq(Expr::var(&x), Expr::constant(3, 4)),
                    soft: true,
                },
            ],
        });
        let mut ctx = ir::Context::new(vec![top_calling("C"), c], "top");
        RandomizeLower::do_pass_default(&mut ctx).unwrap();

        let c = ctx.find_module("C").unwrap();
        let ctl = c.find_var("__Vsoft0__C").unwrap();
        assert_eq!(ctl.borrow().init, Some(1));
        let rand = c.find_task(RANDOMIZE).unwrap();
        let rand = rand.borrow();
        assert!(rand.is_virtual);
        assert!(rand.ret.is_some());
        let text = ir::Printer::stmt_to_str(&rand.body);
        assert!(text.contains("x = $urandom[4];"));
        assert!(text.contains("e = $urandom_choice(1, 2);"));
        assert!(!text.contains("plain ="));
        assert!(text.contains("(x < 4'd10)"));
        assert!(text.contains("(!__Vsoft0__C || (x == 4'd3))"));
        assert!(text.contains("(__Vtries < 32'd64)"));
        assert!(text.contains("__Vrelaxing = relax_next();"));

        let relax = c.find_task(RELAX_NEXT).unwrap();
        assert_eq!(
            ir::Printer::stmt_to_str(&relax.borrow().body),
            "if (__Vsoft0__C)\n  begin\n    __Vsoft0__C = 1'd0;\n    __Vrelaxed = 1'd1;\n  end\n\
             else\n  __Vrelaxed = 1'd0;\n"
        );
    }

    #[test]
    fn subclasses_and_member_classes_are_included() {
        let mut h = class("H", None);
        h.add_var(Variable::new("inner", VarType::Class("C".into())).with_attr(BoolAttr::Rand));
        let mut c = class("C", None);
        c.add_var(Variable::logic("x", 4).with_attr(BoolAttr::Rand));
        let d = class("D", Some("C"));
        let unrelated = class("U", None);
        let mut ctx = ir::Context::new(
            vec![top_calling("H"), h, c, d, unrelated],
            "top",
        );
        ctx.extra_opts = vec!["randomize-lower:attempts=8".to_string()];
        RandomizeLower::do_pass_default(&mut ctx).unwrap();

        for name in ["H", "C", "D"] {
            let m = ctx.find_module(name).unwrap();
            assert!(m.find_task(RANDOMIZE).is_some(), "{name} lacks randomize()");
        }
        assert!(ctx.find_module("U").unwrap().find_task(RANDOMIZE).is_none());

        let h = ctx.find_module("H").unwrap();
        let text = ir::Printer::stmt_to_str(&h.find_task(RANDOMIZE).unwrap().borrow().body);
        assert!(text.contains("(__Vtries < 32'd8)"));
        assert!(text.contains("if ((__Vsubok && (inner != 64'd0)))"));
        assert!(text.contains("__Vsubok = inner.randomize();"));

        // Inherited members are drawn by the subclass.
        let d = ctx.find_module("D").unwrap();
        let text = ir::Printer::stmt_to_str(&d.find_task(RANDOMIZE).unwrap().borrow().body);
        assert!(text.contains("x = $urandom[4];"));
    }

    #[test]
    fn existing_randomize_is_kept() {
        let mut c = class("C", None);
        c.add_task(ir::Task::new(RANDOMIZE, TaskKind::Function, Stmt::empty()));
        let mut ctx = ir::Context::new(vec![top_calling("C"), c], "top");
        RandomizeLower::do_pass_default(&mut ctx).unwrap();
        let c = ctx.find_module("C").unwrap();
        assert!(c.find_task(RELAX_NEXT).is_none());
        assert!(c.find_task(RANDOMIZE).unwrap().borrow().body.is_empty());
    }
}
