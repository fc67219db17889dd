use crate::configuration::RuntimeConfig;
use crate::errors::{BoxedSimError, SimError, SimResult};
use crate::interp::{edge_fired, Machine, Program};
use crate::runtime::TriggerVec;
use ahash::{HashMap, HashMapExt};
use strobe_ir::{
    self as ir, Block, Edge, Id, Region, RegionKind, Schedule, Trigger,
    VIRT_IFACE_TRIGGER_VAR,
};
use strobe_opt::pass_manager::PassManager;

/// Values of the variables a region's triggers observe, as of the last
/// trigger computation.
#[derive(Debug)]
struct PrevValues {
    stl: HashMap<Id, u64>,
    ico: HashMap<Id, u64>,
    /// Shared by `act` and `nba`.
    act: HashMap<Id, u64>,
}

impl PrevValues {
    fn of(&mut self, kind: RegionKind) -> &mut HashMap<Id, u64> {
        match kind {
            RegionKind::Stl => &mut self.stl,
            RegionKind::Ico => &mut self.ico,
            RegionKind::Act | RegionKind::Nba => &mut self.act,
        }
    }
}

/// Evaluate the triggers of `region` and remember the values they
/// observed.
fn compute_triggers(
    region: &Region,
    prev: &mut HashMap<Id, u64>,
    machine: &mut Machine,
    first: bool,
) -> SimResult<TriggerVec> {
    let mut vec = TriggerVec::new(region.triggers.len());
    let mut observed = vec![];
    for (idx, trigger) in region.triggers.iter().enumerate() {
        let set = match trigger {
            Trigger::Edge { var, edge } => {
                let cur = machine.get_global(*var)?;
                let old = prev.get(var).copied().unwrap_or(cur);
                observed.push((*var, cur));
                edge_fired(*edge, old, cur)
            }
            Trigger::Changed(var) => {
                let cur = machine.get_global(*var)?;
                let old = prev.get(var).copied().unwrap_or(cur);
                observed.push((*var, cur));
                old != cur
            }
            Trigger::DynamicResume => machine.has_pending_resume(),
            Trigger::FirstIteration => first,
            Trigger::VirtIface => {
                let name = Id::new(VIRT_IFACE_TRIGGER_VAR);
                let set = machine.get_global(name).unwrap_or(0) != 0;
                if set {
                    machine.set_global(name, 0)?;
                }
                set
            }
        };
        vec.set(idx, set);
    }
    prev.extend(observed);
    Ok(vec)
}

/// Runs a scheduled design.
///
/// Every call to [eval](Simulator::eval) settles the design at the current
/// time: `ico` reacts to changed inputs, then `act` and `nba` alternate
/// until neither has a set trigger. The first call also runs `stl` and
/// starts the `initial` processes. [step](Simulator::step) advances time
/// to the next pending delay.
pub struct Simulator {
    machine: Machine,
    schedule: Schedule,
    prev: PrevValues,
    /// Triggers of `act` iterations since the last `nba` iteration.
    nba_pending: TriggerVec,
    limit: u32,
    max_time: Option<u64>,
    initialized: bool,
}

impl Simulator {
    /// Prepare the simulation of a design that has been through the
    /// lowering pipeline.
    pub fn new(ctx: &ir::Context, config: RuntimeConfig) -> SimResult<Self> {
        let program = Program::new(ctx)?;
        let schedule = program.schedule.clone();
        let limit = config.converge_limit.unwrap_or(schedule.converge_limit);
        Ok(Simulator {
            machine: Machine::new(program, &config)?,
            nba_pending: TriggerVec::new(schedule.nba.triggers.len()),
            schedule,
            prev: PrevValues {
                stl: HashMap::new(),
                ico: HashMap::new(),
                act: HashMap::new(),
            },
            limit,
            max_time: config.max_time,
            initialized: false,
        })
    }

    /// Run the default pass pipeline on `ctx` and prepare its simulation.
    pub fn compile(mut ctx: ir::Context, config: RuntimeConfig) -> SimResult<Self> {
        let pm = PassManager::default_passes()?;
        pm.execute_plan(&mut ctx, &["all".to_string()], &[], false)?;
        Self::new(&ctx, config)
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn time(&self) -> u64 {
        self.machine.time()
    }

    /// `$finish` was executed.
    pub fn is_finished(&self) -> bool {
        self.machine.finished()
    }

    /// Set a variable of the top-level module, typically an input.
    pub fn set(&mut self, name: &str, value: u64) -> SimResult<()> {
        self.machine.set_global(Id::new(name), value)
    }

    pub fn get(&self, name: &str) -> SimResult<u64> {
        self.machine.get_global(Id::new(name))
    }

    fn triggers(&mut self, kind: RegionKind, first: bool) -> SimResult<TriggerVec> {
        let Simulator {
            schedule,
            prev,
            machine,
            ..
        } = self;
        compute_triggers(schedule.region(kind), prev.of(kind), machine, first)
    }

    fn snapshot(&mut self, kind: RegionKind) -> SimResult<()> {
        let Simulator {
            schedule,
            prev,
            machine,
            ..
        } = self;
        let prev = prev.of(kind);
        for trigger in &schedule.region(kind).triggers {
            if let Trigger::Edge { var, .. } | Trigger::Changed(var) = trigger {
                prev.insert(*var, machine.get_global(*var)?);
            }
        }
        Ok(())
    }

    fn run_blocks(&mut self, kind: RegionKind, vec: &TriggerVec) -> SimResult<()> {
        let Simulator {
            schedule, machine, ..
        } = self;
        for sb in &schedule.region(kind).blocks {
            if !vec.any_of(&sb.gate) {
                continue;
            }
            match &sb.block {
                Block::Process(name) => machine.run_process(*name)?,
                Block::ResumeDynamic => machine.resume_dynamic()?,
            }
        }
        Ok(())
    }

    fn non_convergence(&self, kind: RegionKind, vec: &TriggerVec) -> BoxedSimError {
        let region = self.schedule.region(kind);
        let triggers = vec
            .set_bits()
            .filter_map(|idx| region.triggers.get(idx))
            .map(Trigger::to_string)
            .collect();
        SimError::ConvergenceLimit {
            region: kind,
            iterations: self.limit,
            triggers,
        }
        .into()
    }

    /// Iterate `stl` or `ico` until no trigger is set.
    fn converge(&mut self, kind: RegionKind) -> SimResult<()> {
        let mut iterations = 0;
        loop {
            let first = kind == RegionKind::Stl && iterations == 0;
            let vec = self.triggers(kind, first)?;
            if !vec.any() {
                return Ok(());
            }
            if iterations == self.limit {
                return Err(self.non_convergence(kind, &vec));
            }
            iterations += 1;
            log::trace!("{kind} iteration {iterations} at {}", self.time());
            self.run_blocks(kind, &vec)?;
        }
    }

    fn initialize(&mut self) -> SimResult<()> {
        self.initialized = true;
        self.snapshot(RegionKind::Stl)?;
        self.converge(RegionKind::Stl)?;
        self.snapshot(RegionKind::Ico)?;
        self.snapshot(RegionKind::Act)?;
        self.machine.start_initials()
    }

    /// Settle the design at the current time.
    pub fn eval(&mut self) -> SimResult<()> {
        if !self.initialized {
            self.initialize()?;
        }
        self.converge(RegionKind::Ico)?;

        let mut nba_iterations = 0;
        loop {
            let mut act_iterations = 0;
            loop {
                let vec = self.triggers(RegionKind::Act, false)?;
                if !vec.any() {
                    break;
                }
                if act_iterations == self.limit {
                    return Err(self.non_convergence(RegionKind::Act, &vec));
                }
                act_iterations += 1;
                self.nba_pending.or_assign(&vec);
                self.run_blocks(RegionKind::Act, &vec)?;
            }

            if !self.nba_pending.any() && !self.machine.has_nba() {
                return Ok(());
            }
            if nba_iterations == self.limit {
                let pending = self.nba_pending.clone();
                return Err(self.non_convergence(RegionKind::Nba, &pending));
            }
            nba_iterations += 1;
            let vec = std::mem::replace(
                &mut self.nba_pending,
                TriggerVec::new(self.schedule.nba.triggers.len()),
            );
            log::trace!("nba iteration {nba_iterations} at {}", self.time());
            self.run_blocks(RegionKind::Nba, &vec)?;
            self.machine.commit_nba()?;
        }
    }

    /// Advance to the next time a coroutine waits for and settle the
    /// design there. Returns false if nothing is scheduled.
    pub fn step(&mut self) -> SimResult<bool> {
        if !self.initialized {
            self.eval()?;
        }
        let Some(time) = self.machine.next_time() else {
            return Ok(false);
        };
        self.machine.advance(time);
        self.eval()?;
        Ok(true)
    }

    /// Run until `$finish`, until nothing is scheduled, or until the next
    /// step would pass the configured time limit. Returns the final time.
    pub fn run(&mut self) -> SimResult<u64> {
        self.eval()?;
        while !self.is_finished() {
            match self.machine.next_time() {
                Some(t) if self.max_time.is_none_or(|max| t <= max) => {
                    self.step()?;
                }
                _ => break,
            }
        }
        log::info!("simulation stopped at time {}", self.time());
        Ok(self.time())
    }

    /// Run the `final` processes.
    pub fn finish(&mut self) -> SimResult<()> {
        self.machine.run_finals()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_look_at_the_low_bit() {
        assert!(edge_fired(Edge::Pos, 0b10, 0b01));
        assert!(!edge_fired(Edge::Pos, 0b01, 0b11));
        assert!(edge_fired(Edge::Neg, 1, 0));
        assert!(edge_fired(Edge::Both, 0, 1));
        assert!(!edge_fired(Edge::Both, 0b10, 0b00));
        assert!(edge_fired(Edge::Any, 0b10, 0b00));
    }

    #[test]
    fn triggers_compare_against_last_observation() {
        let mut region = Region::new(RegionKind::Ico);
        region.add_trigger(Trigger::Changed(Id::new("a")));
        region.add_trigger(Trigger::FirstIteration);
        let mut prev = HashMap::new();
        prev.insert(Id::new("a"), 1);

        let mut top = ir::Module::new("top", ir::ModuleKind::Design);
        top.add_var(ir::Variable::logic("a", 4).with_init(3));
        top.schedule = Some(Schedule::new(10));
        let ctx = ir::Context::new(vec![top], "top");
        let mut machine =
            Machine::new(Program::new(&ctx).unwrap(), &RuntimeConfig::default())
                .unwrap();

        let vec = compute_triggers(&region, &mut prev, &mut machine, true).unwrap();
        assert_eq!(vec.set_bits().collect::<Vec<_>>(), vec![0, 1]);
        let vec = compute_triggers(&region, &mut prev, &mut machine, false).unwrap();
        assert!(!vec.any());
    }
}
