//! Flattening of statement trees into straight-line code with jumps. A
//! flat program counter lets a coroutine suspend in the middle of a loop
//! and pick up where it left off.
use crate::errors::{SimError, SimResult};
use std::rc::Rc;
use strobe_ir::{
    AssignKind, Callee, Expr, Id, JoinType, Stmt, SyncOp, VarType,
};

#[derive(Debug, Clone)]
pub enum Instr {
    Assign {
        lhs: Expr,
        rhs: Expr,
        kind: AssignKind,
    },
    Jump(usize),
    /// Jump to `target` if `cond` is zero.
    JumpIfZero {
        cond: Expr,
        target: usize,
    },
    Delay(Expr),
    /// Suspend until one of the events fires.
    Await(Vec<Expr>),
    Call {
        callee: Callee,
        args: Vec<Expr>,
        ret: Option<Expr>,
    },
    /// Start each branch as a coroutine of its own.
    Spawn(Vec<Rc<Code>>),
    Fire(Expr),
    Sync(SyncOp),
    Finish,
}

/// Compiled body of a task, process, or fork branch.
#[derive(Debug)]
pub struct Code {
    pub unit: Id,
    pub instrs: Vec<Instr>,
}

impl Code {
    pub fn compile(unit: Id, body: &Stmt) -> SimResult<Code> {
        let mut c = Compiler {
            unit,
            instrs: vec![],
        };
        c.stmt(body)?;
        Ok(Code {
            unit,
            instrs: c.instrs,
        })
    }
}

/// The expression refers to a variable or member of event type.
fn is_event(e: &Expr) -> bool {
    e.target_storage()
        .is_some_and(|vr| matches!(vr.var.borrow().typ, VarType::Event))
        && matches!(e, Expr::Var(_) | Expr::Member { .. })
}

struct Compiler {
    unit: Id,
    instrs: Vec<Instr>,
}

impl Compiler {
    fn unlowered(&self, construct: &'static str) -> SimResult<()> {
        Err(SimError::Unlowered {
            unit: self.unit,
            construct,
        }
        .into())
    }

    fn emit(&mut self, instr: Instr) -> usize {
        self.instrs.push(instr);
        self.instrs.len() - 1
    }

    fn here(&self) -> usize {
        self.instrs.len()
    }

    /// `at` is always the index of a jump emitted by this compiler.
    fn patch(&mut self, at: usize, to: usize) {
        if let Some(Instr::Jump(target) | Instr::JumpIfZero { target, .. }) =
            self.instrs.get_mut(at)
        {
            *target = to;
        }
    }

    fn stmt(&mut self, s: &Stmt) -> SimResult<()> {
        match s {
            Stmt::Seq(seq) => {
                for s in &seq.stmts {
                    self.stmt(s)?;
                }
            }
            Stmt::Assign(a) => {
                if a.delay.is_some() {
                    return self.unlowered("intra-assignment delay");
                }
                self.emit(Instr::Assign {
                    lhs: a.lhs.clone(),
                    rhs: a.rhs.clone(),
                    kind: a.kind,
                });
            }
            Stmt::If(i) => {
                let branch = self.emit(Instr::JumpIfZero {
                    cond: i.cond.clone(),
                    target: 0,
                });
                self.stmt(&i.tbranch)?;
                if i.fbranch.is_empty() {
                    let end = self.here();
                    self.patch(branch, end);
                } else {
                    let skip = self.emit(Instr::Jump(0));
                    let fstart = self.here();
                    self.patch(branch, fstart);
                    self.stmt(&i.fbranch)?;
                    let end = self.here();
                    self.patch(skip, end);
                }
            }
            Stmt::While(w) => {
                let head = self.here();
                let exit = self.emit(Instr::JumpIfZero {
                    cond: w.cond.clone(),
                    target: 0,
                });
                self.stmt(&w.body)?;
                self.emit(Instr::Jump(head));
                let end = self.here();
                self.patch(exit, end);
            }
            Stmt::Delay(d) => {
                self.emit(Instr::Delay(d.amount.clone()));
            }
            Stmt::Timing(t) => {
                if !t.sens.iter().all(|item| is_event(&item.expr)) {
                    return self.unlowered("event control on a signal");
                }
                self.emit(Instr::Await(
                    t.sens.iter().map(|item| item.expr.clone()).collect(),
                ));
                self.stmt(&t.body)?;
            }
            Stmt::Wait(_) => return self.unlowered("wait statement"),
            Stmt::Fork(f) => {
                if f.join != JoinType::None {
                    return self.unlowered("fork with a join");
                }
                let branches = f
                    .branches
                    .iter()
                    .map(|b| Code::compile(self.unit, b).map(Rc::new))
                    .collect::<SimResult<Vec<_>>>()?;
                self.emit(Instr::Spawn(branches));
            }
            Stmt::Call(c) => {
                self.emit(Instr::Call {
                    callee: c.callee.clone(),
                    args: c.args.clone(),
                    ret: c.ret.clone(),
                });
            }
            Stmt::Fire(f) => {
                self.emit(Instr::Fire(f.event.clone()));
            }
            Stmt::Force(_) => return self.unlowered("force"),
            Stmt::Release(_) => return self.unlowered("release"),
            Stmt::Sync(s) => {
                self.emit(Instr::Sync(s.op.clone()));
            }
            Stmt::Finish(_) => {
                self.emit(Instr::Finish);
            }
            Stmt::Empty(_) => (),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strobe_ir::{rrc, Edge, SenItem, Variable};

    #[test]
    fn loops_jump_back_to_their_condition() {
        let x = rrc(Variable::logic("x", 4));
        let body = Stmt::seq(vec![
            Stmt::while_(
                Expr::var(&x),
                Stmt::assign(Expr::var(&x), Expr::constant(0, 4)),
            ),
            Stmt::if_(
                Expr::var(&x),
                Stmt::finish(),
                Stmt::assign(Expr::var(&x), Expr::one()),
            ),
        ]);
        let code = Code::compile(Id::new("p"), &body).unwrap();
        assert!(matches!(code.instrs[0], Instr::JumpIfZero { target: 3, .. }));
        assert!(matches!(code.instrs[2], Instr::Jump(0)));
        assert!(matches!(code.instrs[3], Instr::JumpIfZero { target: 6, .. }));
        assert!(matches!(code.instrs[4], Instr::Finish));
        assert!(matches!(code.instrs[5], Instr::Jump(7)));
        assert_eq!(code.instrs.len(), 7);
    }

    #[test]
    fn signal_timing_is_rejected() {
        let clk = rrc(Variable::logic("clk", 1));
        let ev = rrc(Variable::new("ev", VarType::Event));
        let on_event = Stmt::timing(
            vec![SenItem::new(Edge::Any, Expr::var(&ev))],
            Stmt::empty(),
        );
        assert!(Code::compile(Id::new("p"), &on_event).is_ok());
        let on_signal = Stmt::timing(
            vec![SenItem::new(Edge::Pos, Expr::var(&clk))],
            Stmt::empty(),
        );
        let err = Code::compile(Id::new("p"), &on_signal).unwrap_err();
        assert!(matches!(*err, SimError::Unlowered { .. }));
        let joined = Stmt::fork(vec![Stmt::empty()], JoinType::All);
        assert!(Code::compile(Id::new("p"), &joined).is_err());
    }
}
