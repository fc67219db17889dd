//! Implements a formatter for the in-memory representation of modules.
//! The output uses SystemVerilog-like syntax and is meant for dumps and
//! debugging; it is not parsed back.
use crate::{
    self as ir, AssignKind, Callee, Expr, ModuleKind, ProcessKind, Query,
    SenItem, Stmt, SyncOp, TaskKind, UnOp, VarType,
};
use itertools::Itertools;
use std::io;

/// Printer for the IR.
pub struct Printer;

impl Printer {
    /// Format attributes of the form `(* a, b *) `.
    /// Returns the empty string if the `attrs` is empty.
    fn format_attributes(attrs: &ir::Attributes) -> String {
        if attrs.is_empty() {
            String::new()
        } else {
            format!("(* {} *) ", attrs.iter().join(", "))
        }
    }

    fn format_type(typ: &VarType) -> String {
        match typ {
            VarType::Logic { width: 1 } => "logic".to_string(),
            VarType::Logic { width } => {
                format!("logic [{}:0]", width.saturating_sub(1))
            }
            VarType::Event => "event".to_string(),
            VarType::String => "string".to_string(),
            VarType::Unpacked { width, .. } => {
                format!("logic [{}:0]", width.saturating_sub(1))
            }
            VarType::Enum { width, values } => format!(
                "enum logic [{}:0] {{{}}}",
                width.saturating_sub(1),
                values.iter().join(", ")
            ),
            VarType::Class(c) | VarType::Iface(c) => c.to_string(),
            VarType::VirtIface(c) => format!("virtual {c}"),
            VarType::Semaphore => "semaphore".to_string(),
            VarType::Process => "process".to_string(),
        }
    }

    /// Format a variable declaration.
    pub fn var_to_str(var: &ir::Variable) -> String {
        let dir = match var.direction {
            ir::Direction::None => "",
            ir::Direction::Input => "input ",
            ir::Direction::Output => "output ",
            ir::Direction::Inout => "inout ",
        };
        let dims = match var.typ {
            VarType::Unpacked { len, .. } => format!(" [{len}]"),
            _ => String::new(),
        };
        let init = var.init.map(|v| format!(" = {v}")).unwrap_or_default();
        format!(
            "{}{}{} {}{}{};",
            Self::format_attributes(&var.attributes),
            dir,
            Self::format_type(&var.typ),
            var.name,
            dims,
            init
        )
    }

    pub fn write_context<F: io::Write>(
        ctx: &ir::Context,
        f: &mut F,
    ) -> io::Result<()> {
        for m in &ctx.modules {
            Self::write_module(m, f)?;
            writeln!(f)?;
        }
        Ok(())
    }

    pub fn write_module<F: io::Write>(
        module: &ir::Module,
        f: &mut F,
    ) -> io::Result<()> {
        let (open, close) = match &module.kind {
            ModuleKind::Design => (format!("module {}", module.name), "endmodule"),
            ModuleKind::Interface => {
                (format!("interface {}", module.name), "endinterface")
            }
            ModuleKind::Class { extends: None } => {
                (format!("class {}", module.name), "endclass")
            }
            ModuleKind::Class { extends: Some(base) } => {
                (format!("class {} extends {base}", module.name), "endclass")
            }
        };
        writeln!(
            f,
            "{}{open};",
            Self::format_attributes(&module.attributes)
        )?;
        for var in module.vars.iter().filter(|v| !v.borrow().is_local()) {
            writeln!(f, "  {}", Self::var_to_str(&var.borrow()))?;
        }
        for alias in &module.aliases {
            writeln!(
                f,
                "  alias {} = {};",
                alias.lhs.borrow().name,
                alias.rhs.borrow().name
            )?;
        }
        for c in &module.constraints {
            writeln!(f, "  constraint {} {{", c.name)?;
            for item in &c.items {
                let soft = if item.soft { "soft " } else { "" };
                writeln!(f, "    {soft}{};", Self::expr_to_str(&item.cond))?;
            }
            writeln!(f, "  }}")?;
        }
        for task in module.tasks.iter() {
            let task = task.borrow();
            let (kw, end) = match task.kind {
                TaskKind::Task => ("task", "endtask"),
                TaskKind::Function => ("function", "endfunction"),
            };
            let args = task
                .args
                .iter()
                .map(|a| {
                    let a = a.borrow();
                    format!("{} {}", Self::format_type(&a.typ), a.name)
                })
                .join(", ");
            let virt = if task.is_virtual { "virtual " } else { "" };
            writeln!(
                f,
                "  {}{virt}{kw} {}({args});",
                Self::format_attributes(&task.attributes),
                task.name
            )?;
            for local in module.vars.iter() {
                let local = local.borrow();
                let is_arg = task.args.iter().any(|a| a.borrow().name == local.name);
                if local.scope == ir::Scope::Local(task.name) && !is_arg {
                    writeln!(f, "    {}", Self::var_to_str(&local))?;
                }
            }
            Self::write_stmt(&task.body, 4, f)?;
            writeln!(f, "  {end}")?;
        }
        for proc in module.processes.iter() {
            let proc = proc.borrow();
            let head = match &proc.kind {
                ProcessKind::Initial => "initial".to_string(),
                ProcessKind::Final => "final".to_string(),
                ProcessKind::Always(None) => "always".to_string(),
                ProcessKind::Always(Some(sens)) => {
                    format!("always @({})", Self::sens_to_str(sens))
                }
                ProcessKind::Comb => "always_comb".to_string(),
                ProcessKind::Continuous => "assign".to_string(),
            };
            writeln!(
                f,
                "  {}{head} // {}",
                Self::format_attributes(&proc.attributes),
                proc.name
            )?;
            Self::write_stmt(&proc.body, 4, f)?;
        }
        if let Some(sched) = &module.schedule {
            for region in [&sched.stl, &sched.ico, &sched.act, &sched.nba] {
                writeln!(f, "  // region {}", region.kind)?;
                for (i, t) in region.triggers.iter().enumerate() {
                    writeln!(f, "  //   [{i}] {t}")?;
                }
                for b in &region.blocks {
                    writeln!(f, "  //   {:?} if {:?}", b.block, b.gate)?;
                }
            }
        }
        writeln!(f, "{close}")
    }

    fn sens_to_str(sens: &[SenItem]) -> String {
        sens.iter()
            .map(|s| format!("{} {}", s.edge, Self::expr_to_str(&s.expr)))
            .join(" or ")
    }

    /// Format and write a statement.
    pub fn write_stmt<F: io::Write>(
        stmt: &Stmt,
        indent: usize,
        f: &mut F,
    ) -> io::Result<()> {
        let pad = " ".repeat(indent);
        let attrs = Self::format_attributes(ir::GetAttributes::get_attributes(stmt));
        match stmt {
            Stmt::Seq(s) => {
                writeln!(f, "{pad}{attrs}begin")?;
                for st in &s.stmts {
                    Self::write_stmt(st, indent + 2, f)?;
                }
                writeln!(f, "{pad}end")
            }
            Stmt::Assign(a) => {
                let op = match a.kind {
                    AssignKind::Blocking => "=",
                    AssignKind::NonBlocking => "<=",
                };
                let delay = a
                    .delay
                    .as_ref()
                    .map(|d| format!("#{} ", Self::expr_to_str(d)))
                    .unwrap_or_default();
                writeln!(
                    f,
                    "{pad}{attrs}{} {op} {delay}{};",
                    Self::expr_to_str(&a.lhs),
                    Self::expr_to_str(&a.rhs)
                )
            }
            Stmt::If(i) => {
                writeln!(f, "{pad}{attrs}if ({})", Self::expr_to_str(&i.cond))?;
                Self::write_stmt(&i.tbranch, indent + 2, f)?;
                if !i.fbranch.is_empty() {
                    writeln!(f, "{pad}else")?;
                    Self::write_stmt(&i.fbranch, indent + 2, f)?;
                }
                Ok(())
            }
            Stmt::While(w) => {
                writeln!(f, "{pad}{attrs}while ({})", Self::expr_to_str(&w.cond))?;
                Self::write_stmt(&w.body, indent + 2, f)
            }
            Stmt::Delay(d) => {
                writeln!(f, "{pad}{attrs}#{};", Self::expr_to_str(&d.amount))
            }
            Stmt::Timing(t) => {
                writeln!(f, "{pad}{attrs}@({})", Self::sens_to_str(&t.sens))?;
                Self::write_stmt(&t.body, indent + 2, f)
            }
            Stmt::Wait(w) => {
                writeln!(f, "{pad}{attrs}wait ({})", Self::expr_to_str(&w.cond))?;
                Self::write_stmt(&w.body, indent + 2, f)
            }
            Stmt::Fork(fk) => {
                writeln!(f, "{pad}{attrs}fork")?;
                for b in &fk.branches {
                    Self::write_stmt(b, indent + 2, f)?;
                }
                writeln!(f, "{pad}{}", fk.join.keyword())
            }
            Stmt::Call(c) => {
                let callee = match &c.callee {
                    Callee::Task(name) => name.to_string(),
                    Callee::Method { obj, name } => {
                        format!("{}.{name}", Self::expr_to_str(obj))
                    }
                };
                let args = c.args.iter().map(Self::expr_to_str).join(", ");
                let ret = c
                    .ret
                    .as_ref()
                    .map(|r| format!("{} = ", Self::expr_to_str(r)))
                    .unwrap_or_default();
                writeln!(f, "{pad}{attrs}{ret}{callee}({args});")
            }
            Stmt::Fire(e) => {
                writeln!(f, "{pad}{attrs}-> {};", Self::expr_to_str(&e.event))
            }
            Stmt::Force(fc) => writeln!(
                f,
                "{pad}{attrs}force {} = {};",
                Self::expr_to_str(&fc.lhs),
                Self::expr_to_str(&fc.rhs)
            ),
            Stmt::Release(r) => {
                writeln!(f, "{pad}{attrs}release {};", Self::expr_to_str(&r.lhs))
            }
            Stmt::Sync(s) => {
                let text = match &s.op {
                    SyncOp::SemGet { sem, keys } => format!(
                        "{}.get({})",
                        Self::expr_to_str(sem),
                        Self::expr_to_str(keys)
                    ),
                    SyncOp::SemPut { sem, keys } => format!(
                        "{}.put({})",
                        Self::expr_to_str(sem),
                        Self::expr_to_str(keys)
                    ),
                    SyncOp::ProcSelf { target } => {
                        format!("{} = process::self()", Self::expr_to_str(target))
                    }
                    SyncOp::ProcKill(h) => {
                        format!("{}.kill()", Self::expr_to_str(h))
                    }
                    SyncOp::ProcAwait(h) => {
                        format!("{}.await()", Self::expr_to_str(h))
                    }
                };
                writeln!(f, "{pad}{attrs}{text};")
            }
            Stmt::Finish(_) => writeln!(f, "{pad}{attrs}$finish;"),
            Stmt::Empty(_) => writeln!(f, "{pad}{attrs};"),
        }
    }

    /// Format a statement as a string.
    pub fn stmt_to_str(stmt: &Stmt) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec does not fail.
        let _ = Self::write_stmt(stmt, 0, &mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Format an expression.
    pub fn expr_to_str(expr: &Expr) -> String {
        match expr {
            Expr::Const { value, width } => format!("{width}'d{value}"),
            Expr::Var(vr) => vr.name().to_string(),
            Expr::Member { obj, field } => {
                format!("{}.{}", Self::expr_to_str(obj), field.name())
            }
            Expr::Sel { base, lsb, width } => format!(
                "{}[{} +: {width}]",
                Self::expr_to_str(base),
                Self::expr_to_str(lsb)
            ),
            Expr::Slice { base, lsb, width } => {
                format!("{}[{}:{lsb}]", Self::expr_to_str(base), lsb + width - 1)
            }
            Expr::Unary(UnOp::Not, e) => format!("~{}", Self::expr_to_str(e)),
            Expr::Unary(UnOp::LogNot, e) => format!("!{}", Self::expr_to_str(e)),
            Expr::Binary(op, l, r) => format!(
                "({} {} {})",
                Self::expr_to_str(l),
                op.symbol(),
                Self::expr_to_str(r)
            ),
            Expr::Concat(es) => {
                format!("{{{}}}", es.iter().map(Self::expr_to_str).join(", "))
            }
            Expr::Random { width, choices: None } => format!("$urandom[{width}]"),
            Expr::Random {
                choices: Some(vals),
                ..
            } => format!("$urandom_choice({})", vals.iter().join(", ")),
            Expr::New(c) => format!("new {c}"),
            Expr::Query(Query::SemTryGet { sem, keys }) => format!(
                "{}.try_get({})",
                Self::expr_to_str(sem),
                Self::expr_to_str(keys)
            ),
            Expr::Query(Query::ProcStatus(h)) => {
                format!("{}.status()", Self::expr_to_str(h))
            }
        }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Printer::expr_to_str(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{rrc, Edge, Variable};

    #[test]
    fn prints_timing_and_nba() {
        let clk = rrc(Variable::logic("clk", 1));
        let q = rrc(Variable::logic("q", 8));
        let s = Stmt::timing(
            vec![SenItem::new(Edge::Pos, Expr::var(&clk))],
            Stmt::nba(Expr::var(&q), Expr::constant(3, 8)),
        );
        let text = Printer::stmt_to_str(&s);
        assert_eq!(text, "@(posedge clk)\n  q <= 8'd3;\n");
    }
}
