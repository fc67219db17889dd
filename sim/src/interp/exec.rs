use super::code::Instr;
use super::values::{self, Heap, Location, Object, Slot, Store, NULL};
use super::{Code, FieldInit, Program, Routine};
use crate::configuration::RuntimeConfig;
use crate::errors::{SimError, SimResult};
use crate::runtime::{
    status, CoroutineId, DelayedQueue, EventDispatcher, ProcessTable,
    ResumeReason, Semaphore,
};
use ahash::{HashMap, HashMapExt};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::collections::VecDeque;
use std::rc::Rc;
use strobe_ir::{
    mask, AssignKind, Callee, Direction, Edge, Expr, Id, Query, SyncOp, VarRef,
    VarType,
};

/// Id used while a statically scheduled block runs. It never appears in
/// the process table.
const STATIC_CONTEXT: CoroutineId = CoroutineId::MAX;

/// One activation of a routine.
struct Frame {
    uid: u64,
    routine: Rc<Routine>,
    code: Rc<Code>,
    pc: usize,
    locals: HashMap<Id, u64>,
    /// Object a method runs on.
    this: Option<u64>,
    /// Where the caller wants the return value.
    ret_to: Option<Expr>,
    /// Output arguments copied back to the caller on return.
    outs: Vec<(Id, Expr)>,
}

impl Frame {
    fn enter(uid: u64, routine: Rc<Routine>, this: Option<u64>) -> Self {
        Frame {
            uid,
            code: Rc::clone(&routine.code),
            locals: routine.fresh_locals(),
            routine,
            pc: 0,
            this,
            ret_to: None,
            outs: vec![],
        }
    }
}

/// A thread of execution that can suspend.
struct Coroutine {
    id: CoroutineId,
    /// Process or task the coroutine started in.
    unit: Id,
    frames: Vec<Frame>,
    reason: ResumeReason,
}

/// How an activation of a coroutine ended.
enum Outcome {
    Suspended,
    Done,
    Killed,
}

/// Executes the processes and tasks of a [Program].
pub struct Machine {
    program: Program,
    store: Store,
    heap: Heap,
    /// Suspended coroutines. A coroutine is taken out while it runs.
    coroutines: HashMap<CoroutineId, Coroutine>,
    table: ProcessTable,
    events: EventDispatcher<Slot>,
    delayed: DelayedQueue,
    ready: VecDeque<(CoroutineId, ResumeReason)>,
    /// Pending nonblocking assignments in program order.
    nba: Vec<(Location, u64)>,
    rng: StdRng,
    time: u64,
    finished: bool,
    max_steps: u64,
    next_uid: u64,
}

impl Machine {
    pub fn new(program: Program, config: &RuntimeConfig) -> SimResult<Self> {
        let globals = program.globals.clone();
        let mut machine = Machine {
            program,
            store: Store::default(),
            heap: Heap::default(),
            coroutines: HashMap::new(),
            table: ProcessTable::default(),
            events: EventDispatcher::default(),
            delayed: DelayedQueue::default(),
            ready: VecDeque::new(),
            nba: vec![],
            rng: StdRng::seed_from_u64(config.seed),
            time: 0,
            finished: false,
            max_steps: config.max_steps,
            next_uid: 0,
        };
        for g in &globals {
            let value = machine.initial_value(g)?;
            machine.store.declare(g.name, g.typ.width(), value);
        }
        Ok(machine)
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    /// `$finish` was executed.
    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn get_global(&self, name: Id) -> SimResult<u64> {
        self.store.get(name)
    }

    pub fn set_global(&mut self, name: Id, value: u64) -> SimResult<()> {
        self.store.set(name, value)
    }

    /// Value of a member of the object `handle` points to.
    pub fn get_field(&self, handle: u64, field: Id) -> SimResult<u64> {
        self.heap
            .field(handle, field)
            .ok_or_else(|| SimError::UnknownVariable(field).into())
    }

    /// `process::status()` of the coroutine a process handle refers to.
    pub fn process_status(&self, handle: u64) -> Option<u64> {
        let co = usize::try_from(handle).ok()?.checked_sub(1)?;
        self.table.status(co)
    }

    fn fresh_uid(&mut self) -> u64 {
        self.next_uid += 1;
        self.next_uid
    }

    fn initial_value(&mut self, var: &FieldInit) -> SimResult<u64> {
        match &var.typ {
            VarType::Iface(name) => self.alloc_instance(*name),
            VarType::Semaphore => {
                Ok(self.heap.alloc(Object::Semaphore(Semaphore::new(var.init))))
            }
            typ => Ok(mask(var.init, typ.width())),
        }
    }

    fn alloc_instance(&mut self, class: Id) -> SimResult<u64> {
        let layout = self
            .program
            .layout(class)
            .ok_or(SimError::UnknownClass(class))?
            .to_vec();
        let mut fields = HashMap::with_capacity(layout.len());
        for f in &layout {
            let value = self.initial_value(f)?;
            fields.insert(f.name, value);
        }
        Ok(self.heap.alloc(Object::Instance { class, fields }))
    }

    /// Queue every `initial` process to start in the next resumption.
    pub fn start_initials(&mut self) -> SimResult<()> {
        for name in self.program.initials.clone() {
            let routine = self
                .program
                .process(name)
                .ok_or(SimError::UnknownTask(name))?;
            let id = self.table.spawn();
            let frame = Frame::enter(self.fresh_uid(), routine, None);
            self.table.set_status(id, status::WAITING);
            self.coroutines.insert(
                id,
                Coroutine {
                    id,
                    unit: name,
                    frames: vec![frame],
                    reason: ResumeReason::Start,
                },
            );
            self.ready.push_back((id, ResumeReason::Start));
        }
        Ok(())
    }

    /// Run the body of a statically scheduled process to completion.
    pub fn run_process(&mut self, name: Id) -> SimResult<()> {
        let routine = self
            .program
            .process(name)
            .ok_or(SimError::UnknownTask(name))?;
        let mut co = Coroutine {
            id: STATIC_CONTEXT,
            unit: name,
            frames: vec![Frame::enter(self.fresh_uid(), routine, None)],
            reason: ResumeReason::Start,
        };
        match self.exec(&mut co, true)? {
            Outcome::Suspended => Err(SimError::StaticSuspend(name).into()),
            Outcome::Done | Outcome::Killed => Ok(()),
        }
    }

    /// Run the `final` processes.
    pub fn run_finals(&mut self) -> SimResult<()> {
        for name in self.program.finals.clone() {
            self.run_process(name)?;
        }
        Ok(())
    }

    /// Some coroutine is waiting to be resumed.
    pub fn has_pending_resume(&self) -> bool {
        !self.ready.is_empty() || self.events.has_pending()
    }

    /// Resume the coroutines whose events fired, then everything that was
    /// ready before this call. Coroutines readied while this runs wait for
    /// the next call.
    pub fn resume_dynamic(&mut self) -> SimResult<()> {
        let fired = self.events.resume_triggered();
        self.ready
            .extend(fired.into_iter().map(|co| (co, ResumeReason::Event)));
        let batch: Vec<_> = self.ready.drain(..).collect();
        for (co, reason) in batch {
            self.resume(co, reason)?;
        }
        Ok(())
    }

    pub fn has_nba(&self) -> bool {
        !self.nba.is_empty()
    }

    /// Perform the pending nonblocking assignments in program order.
    /// Members of objects have no event bridge, so their edge events are
    /// fired here.
    pub fn commit_nba(&mut self) -> SimResult<()> {
        for (loc, value) in std::mem::take(&mut self.nba) {
            let old = self.load_shared(loc.slot)?;
            let new = loc.splice(old, value);
            self.store_shared(loc.slot, new)?;
            if let Slot::Field { obj, field } = loc.slot {
                for (edge, ev) in self.field_events(obj, field) {
                    if values::edge_fired(edge, old, new) {
                        self.events.fire(Slot::Field { obj, field: ev });
                    }
                }
            }
        }
        Ok(())
    }

    fn field_events(&self, obj: u64, field: Id) -> Vec<(Edge, Id)> {
        self.heap
            .class_of(obj)
            .and_then(|class| self.program.layout(class))
            .and_then(|layout| layout.iter().find(|f| f.name == field))
            .map(|f| f.edge_events.clone())
            .unwrap_or_default()
    }

    pub fn next_time(&self) -> Option<u64> {
        self.delayed.next_time()
    }

    /// Move simulation time to `time` and ready the coroutines due by then.
    pub fn advance(&mut self, time: u64) {
        if time > self.time {
            self.time = time;
            self.events.reset_triggered();
        }
        for co in self.delayed.pop_due(time) {
            if self.table.status(co) == Some(status::WAITING)
                && self.coroutines.contains_key(&co)
            {
                self.ready.push_back((co, ResumeReason::Delay));
            }
        }
    }

    fn resume(&mut self, id: CoroutineId, reason: ResumeReason) -> SimResult<()> {
        let Some(mut co) = self.coroutines.remove(&id) else {
            return Ok(());
        };
        self.table.set_status(id, status::RUNNING);
        co.reason = reason;
        log::debug!("resume `{}` ({:?}) at {}", co.unit, co.reason, self.time);
        let outcome = self.exec(&mut co, false)?;
        self.settle(co, outcome);
        Ok(())
    }

    fn settle(&mut self, co: Coroutine, outcome: Outcome) {
        match outcome {
            Outcome::Suspended => {
                self.table.set_status(co.id, status::WAITING);
                self.coroutines.insert(co.id, co);
            }
            Outcome::Done => {
                log::trace!("`{}` finished at {}", co.unit, self.time);
                let awaiters = self.table.finish(co.id);
                self.ready.extend(
                    awaiters.into_iter().map(|a| (a, ResumeReason::ProcessDone)),
                );
            }
            Outcome::Killed => self.kill(co.id),
        }
    }

    fn kill(&mut self, target: CoroutineId) {
        if self.table.is_done(target) {
            return;
        }
        log::debug!("killing coroutine {target} at {}", self.time);
        let awaiters = self.table.kill(target);
        self.coroutines.remove(&target);
        self.events.forget(target);
        self.heap.cancel_waiter(target);
        self.ready.retain(|(co, _)| *co != target);
        self.ready
            .extend(awaiters.into_iter().map(|a| (a, ResumeReason::ProcessDone)));
    }

    /// Execute `co` until it suspends or runs out of code.
    fn exec(&mut self, co: &mut Coroutine, in_static: bool) -> SimResult<Outcome> {
        let id = co.id;
        let unit = co.unit;
        let mut steps: u64 = 0;
        loop {
            let Some(frame) = co.frames.last_mut() else {
                return Ok(Outcome::Done);
            };
            let code = Rc::clone(&frame.code);
            let Some(instr) = code.instrs.get(frame.pc) else {
                self.ret(co)?;
                continue;
            };
            frame.pc += 1;
            steps += 1;
            if steps > self.max_steps {
                return Err(SimError::StepLimit {
                    unit,
                    limit: self.max_steps,
                }
                .into());
            }

            match instr {
                Instr::Assign { lhs, rhs, kind } => {
                    let value = self.eval(frame, rhs)?;
                    self.assign(frame, lhs, value, *kind)?;
                }
                Instr::Jump(target) => frame.pc = *target,
                Instr::JumpIfZero { cond, target } => {
                    if self.eval(frame, cond)? == 0 {
                        frame.pc = *target;
                    }
                }
                Instr::Delay(amount) => {
                    let amount = self.eval(frame, amount)?;
                    if in_static {
                        return Err(SimError::StaticSuspend(unit).into());
                    }
                    self.delayed.push(self.time.saturating_add(amount), id);
                    return Ok(Outcome::Suspended);
                }
                Instr::Await(events) => {
                    if in_static {
                        return Err(SimError::StaticSuspend(unit).into());
                    }
                    for ev in events {
                        let loc = self.locate(frame, ev)?;
                        self.events.wait(loc.slot, id);
                    }
                    return Ok(Outcome::Suspended);
                }
                Instr::Call { callee, args, ret } => {
                    let (routine, this) = self.resolve_call(frame, callee)?;
                    if routine.params.len() != args.len() {
                        return Err(SimError::Arity {
                            task: routine.name,
                            expected: routine.params.len(),
                            found: args.len(),
                        }
                        .into());
                    }
                    let mut callee = Frame::enter(self.fresh_uid(), Rc::clone(&routine), this);
                    for (param, arg) in routine.params.iter().zip(args) {
                        if param.direction != Direction::Output {
                            let value = self.eval(frame, arg)?;
                            callee.locals.insert(param.name, mask(value, param.width));
                        }
                        if matches!(param.direction, Direction::Output | Direction::Inout) {
                            callee.outs.push((param.name, arg.clone()));
                        }
                    }
                    callee.ret_to = ret.clone();
                    co.frames.push(callee);
                }
                Instr::Spawn(branches) => {
                    let routine = Rc::clone(&frame.routine);
                    let locals = frame.locals.clone();
                    let this = frame.this;
                    for branch in branches {
                        let child = Frame {
                            uid: self.fresh_uid(),
                            routine: Rc::clone(&routine),
                            code: Rc::clone(branch),
                            pc: 0,
                            locals: locals.clone(),
                            this,
                            ret_to: None,
                            outs: vec![],
                        };
                        let child_id = self.table.spawn();
                        log::trace!("`{unit}` spawns coroutine {child_id}");
                        let mut child = Coroutine {
                            id: child_id,
                            unit,
                            frames: vec![child],
                            reason: ResumeReason::Start,
                        };
                        let outcome = self.exec(&mut child, false)?;
                        self.settle(child, outcome);
                    }
                    // A branch may have killed its parent.
                    if self.table.is_done(id) {
                        return Ok(Outcome::Killed);
                    }
                }
                Instr::Fire(ev) => {
                    let loc = self.locate(frame, ev)?;
                    self.events.fire(loc.slot);
                }
                Instr::Sync(op) => {
                    if let Some(outcome) = self.sync(frame, op, id, in_static)? {
                        return Ok(outcome);
                    }
                }
                Instr::Finish => {
                    log::info!("$finish called from `{unit}` at time {}", self.time);
                    self.finished = true;
                    return Ok(Outcome::Done);
                }
            }
        }
    }

    /// Execute a synchronization operation. Returns how the coroutine
    /// stops, if it does.
    fn sync(
        &mut self,
        frame: &mut Frame,
        op: &SyncOp,
        id: CoroutineId,
        in_static: bool,
    ) -> SimResult<Option<Outcome>> {
        let unit = frame.code.unit;
        match op {
            SyncOp::SemGet { sem, keys } => {
                let handle = self.eval(frame, sem)?;
                let n = self.eval(frame, keys)?;
                let s = self.semaphore(handle, sem)?;
                if in_static {
                    if s.try_get(n) {
                        return Ok(None);
                    }
                    return Err(SimError::StaticSuspend(unit).into());
                }
                if !s.get(id, n) {
                    return Ok(Some(Outcome::Suspended));
                }
            }
            SyncOp::SemPut { sem, keys } => {
                let handle = self.eval(frame, sem)?;
                let n = self.eval(frame, keys)?;
                let granted = self.semaphore(handle, sem)?.put(n);
                self.ready
                    .extend(granted.into_iter().map(|co| (co, ResumeReason::Semaphore)));
            }
            SyncOp::ProcSelf { target } => {
                let handle = if in_static { NULL } else { id as u64 + 1 };
                self.assign(frame, target, handle, AssignKind::Blocking)?;
            }
            SyncOp::ProcKill(h) => {
                let target = self.process_handle(frame, h)?;
                if target == id {
                    return Ok(Some(Outcome::Killed));
                }
                self.kill(target);
            }
            SyncOp::ProcAwait(h) => {
                let target = self.process_handle(frame, h)?;
                if self.table.is_done(target) {
                    return Ok(None);
                }
                if in_static {
                    return Err(SimError::StaticSuspend(unit).into());
                }
                if !self.table.await_finish(target, id) {
                    return Ok(Some(Outcome::Suspended));
                }
            }
        }
        Ok(None)
    }

    /// Return from the innermost frame of `co`.
    fn ret(&mut self, co: &mut Coroutine) -> SimResult<()> {
        let Some(done) = co.frames.pop() else {
            return Ok(());
        };
        let Some(caller) = co.frames.last_mut() else {
            return Ok(());
        };
        if let (Some(lhs), Some(ret)) = (&done.ret_to, done.routine.ret) {
            let value = done.locals.get(&ret).copied().unwrap_or(0);
            self.assign(caller, lhs, value, AssignKind::Blocking)?;
        }
        for (param, lhs) in &done.outs {
            let value = done.locals.get(param).copied().unwrap_or(0);
            self.assign(caller, lhs, value, AssignKind::Blocking)?;
        }
        Ok(())
    }

    fn resolve_call(
        &mut self,
        frame: &Frame,
        callee: &Callee,
    ) -> SimResult<(Rc<Routine>, Option<u64>)> {
        match callee {
            Callee::Task(name) => {
                // Inside a method, sibling methods dispatch on the object.
                let method = frame.this.and_then(|obj| {
                    let class = self.heap.class_of(obj)?;
                    self.program.method(class, *name).map(|r| (r, Some(obj)))
                });
                method
                    .or_else(|| {
                        self.program
                            .task(frame.routine.module, *name)
                            .map(|r| (r, frame.this))
                    })
                    .ok_or_else(|| SimError::UnknownTask(*name).into())
            }
            Callee::Method { obj, name } => {
                let handle = self.eval(frame, obj)?;
                self.check_null(handle, obj)?;
                let class = self.heap.class_of(handle).ok_or_else(|| {
                    SimError::BadHandle(obj.to_string(), "class instance")
                })?;
                let routine = self
                    .program
                    .method(class, *name)
                    .ok_or(SimError::UnknownTask(*name))?;
                Ok((routine, Some(handle)))
            }
        }
    }

    fn check_null(&self, handle: u64, e: &Expr) -> SimResult<()> {
        if handle == NULL {
            Err(SimError::NullHandle(e.to_string()).into())
        } else {
            Ok(())
        }
    }

    fn semaphore(&mut self, handle: u64, e: &Expr) -> SimResult<&mut Semaphore> {
        self.check_null(handle, e)?;
        self.heap
            .semaphore_mut(handle)
            .ok_or_else(|| SimError::BadHandle(e.to_string(), "semaphore").into())
    }

    fn process_handle(&mut self, frame: &Frame, h: &Expr) -> SimResult<CoroutineId> {
        let handle = self.eval(frame, h)?;
        self.check_null(handle, h)?;
        usize::try_from(handle - 1)
            .ok()
            .filter(|co| self.table.status(*co).is_some())
            .ok_or_else(|| SimError::BadHandle(h.to_string(), "process").into())
    }

    /// Storage a variable reference resolves to in `frame`.
    fn var_slot(&self, frame: &Frame, vr: &VarRef) -> SimResult<Slot> {
        let (name, local) = {
            let v = vr.var.borrow();
            (v.name, v.is_local())
        };
        if local {
            return Ok(Slot::Local {
                frame: frame.uid,
                name,
            });
        }
        if let Some(obj) = frame.this.filter(|obj| self.heap.has_field(*obj, name)) {
            return Ok(Slot::Field { obj, field: name });
        }
        if self.store.contains(name) {
            Ok(Slot::Global(name))
        } else {
            Err(SimError::UnknownVariable(name).into())
        }
    }

    fn load_shared(&self, slot: Slot) -> SimResult<u64> {
        match slot {
            Slot::Global(name) => self.store.get(name),
            Slot::Field { obj, field } => self
                .heap
                .field(obj, field)
                .ok_or_else(|| SimError::UnknownVariable(field).into()),
            Slot::Local { name, .. } => Err(SimError::UnknownVariable(name).into()),
        }
    }

    fn store_shared(&mut self, slot: Slot, value: u64) -> SimResult<()> {
        match slot {
            Slot::Global(name) => self.store.set(name, value),
            Slot::Field { obj, field } => {
                if self.heap.set_field(obj, field, value) {
                    Ok(())
                } else {
                    Err(SimError::UnknownVariable(field).into())
                }
            }
            Slot::Local { name, .. } => Err(SimError::UnknownVariable(name).into()),
        }
    }

    fn load(&self, frame: &Frame, slot: Slot) -> SimResult<u64> {
        match slot {
            Slot::Local { name, .. } => frame
                .locals
                .get(&name)
                .copied()
                .ok_or_else(|| SimError::UnknownVariable(name).into()),
            slot => self.load_shared(slot),
        }
    }

    fn store_at(&mut self, frame: &mut Frame, loc: &Location, value: u64) -> SimResult<()> {
        let old = self.load(frame, loc.slot)?;
        let new = loc.splice(old, value);
        match loc.slot {
            Slot::Local { name, .. } => {
                frame.locals.insert(name, new);
                Ok(())
            }
            slot => self.store_shared(slot, new),
        }
    }

    /// Write `value` to `lhs`. Nonblocking writes to automatic variables
    /// happen immediately; all others wait for the NBA commit.
    fn assign(
        &mut self,
        frame: &mut Frame,
        lhs: &Expr,
        value: u64,
        kind: AssignKind,
    ) -> SimResult<()> {
        if let Expr::Concat(parts) = lhs {
            let mut offset = 0;
            for part in parts.iter().rev() {
                let width = part.width();
                let bits = if offset >= 64 { 0 } else { mask(value >> offset, width) };
                self.assign(frame, part, bits, kind)?;
                offset += width;
            }
            return Ok(());
        }
        let loc = self.locate(frame, lhs)?;
        match (kind, loc.slot) {
            (AssignKind::NonBlocking, Slot::Global(_) | Slot::Field { .. }) => {
                self.nba.push((loc, value));
                Ok(())
            }
            _ => self.store_at(frame, &loc, value),
        }
    }

    /// Bits written when `lv` is assigned.
    fn locate(&mut self, frame: &Frame, lv: &Expr) -> SimResult<Location> {
        match lv {
            Expr::Var(vr) => Ok(Location::whole(self.var_slot(frame, vr)?, vr.width())),
            Expr::Member { obj, field } => {
                let handle = self.eval(frame, obj)?;
                self.check_null(handle, obj)?;
                let slot = Slot::Field {
                    obj: handle,
                    field: field.name(),
                };
                Ok(Location::whole(slot, field.width()))
            }
            Expr::Slice { base, lsb, width } => {
                let mut loc = self.locate(frame, base)?;
                loc.lsb = loc.lsb.saturating_add(*lsb);
                loc.width = *width;
                Ok(loc)
            }
            Expr::Sel { base, lsb, width } => {
                let lsb = self.eval(frame, lsb)?;
                let mut loc = self.locate(frame, base)?;
                loc.lsb = loc.lsb.saturating_add(lsb);
                loc.width = *width;
                Ok(loc)
            }
            _ => Err(SimError::InvalidLvalue(lv.to_string()).into()),
        }
    }

    fn eval(&mut self, frame: &Frame, e: &Expr) -> SimResult<u64> {
        let value = match e {
            Expr::Const { value, width } => mask(*value, *width),
            Expr::Var(vr) => {
                let slot = self.var_slot(frame, vr)?;
                if matches!(vr.var.borrow().typ, VarType::Event) {
                    self.events.is_triggered(&slot) as u64
                } else {
                    self.load(frame, slot)?
                }
            }
            Expr::Member { obj, field } => {
                let handle = self.eval(frame, obj)?;
                self.check_null(handle, obj)?;
                let slot = Slot::Field {
                    obj: handle,
                    field: field.name(),
                };
                if matches!(field.var.borrow().typ, VarType::Event) {
                    self.events.is_triggered(&slot) as u64
                } else {
                    self.load_shared(slot)?
                }
            }
            Expr::Sel { base, lsb, width } => {
                let base = self.eval(frame, base)?;
                let lsb = self.eval(frame, lsb)?;
                extract(base, lsb, *width)
            }
            Expr::Slice { base, lsb, width } => extract(self.eval(frame, base)?, *lsb, *width),
            Expr::Unary(op, x) => {
                let x = self.eval(frame, x)?;
                values::unary(*op, x, e.width())
            }
            Expr::Binary(op, l, r) => {
                let l = self.eval(frame, l)?;
                let r = self.eval(frame, r)?;
                values::binary(*op, l, r, e.width())
            }
            Expr::Concat(parts) => {
                let mut acc = 0;
                for part in parts {
                    let v = self.eval(frame, part)?;
                    acc = values::concat(acc, v, part.width());
                }
                acc
            }
            Expr::Random { width, choices } => match choices {
                Some(choices) if !choices.is_empty() => {
                    mask(choices[self.rng.gen_range(0..choices.len())], *width)
                }
                _ => mask(self.rng.next_u64(), *width),
            },
            Expr::New(class) => self.alloc_instance(*class)?,
            Expr::Query(Query::SemTryGet { sem, keys }) => {
                let handle = self.eval(frame, sem)?;
                let n = self.eval(frame, keys)?;
                self.semaphore(handle, sem)?.try_get(n) as u64
            }
            Expr::Query(Query::ProcStatus(h)) => {
                let co = self.process_handle(frame, h)?;
                self.table.status(co).unwrap_or(status::FINISHED)
            }
        };
        Ok(value)
    }
}

/// Bits `lsb .. lsb + width` of `value`.
fn extract(value: u64, lsb: u64, width: u64) -> u64 {
    if lsb >= 64 {
        0
    } else {
        mask(value >> lsb, width)
    }
}
