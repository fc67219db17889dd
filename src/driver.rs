//! Driver for the strobe compiler.
use crate::cmdline::{Emit, Opts};
use crate::demos;
use std::io::Write;
use strobe_ir as ir;
use strobe_opt::pass_manager::PassManager;
use strobe_sim::{RuntimeConfig, SimError, SimResult, Simulator};
use strobe_utils::Error;

/// Configure the global logger: no timestamps, written to stderr.
pub fn init_logging(level: log::LevelFilter) {
    env_logger::Builder::new()
        .format_timestamp(None)
        .filter_level(level)
        .target(env_logger::Target::Stderr)
        .init();
}

/// Run the passes of `plan` over `ctx`.
pub fn lower(
    ctx: &mut ir::Context,
    plan: &[String],
    disabled: &[String],
    dump_ir: bool,
) -> SimResult<()> {
    let pm = PassManager::default_passes()?;
    pm.execute_plan(ctx, plan, disabled, dump_ir)?;
    Ok(())
}

/// Final values of the variables of the top-level module after a full
/// simulation run.
pub fn simulate(
    ctx: &ir::Context,
    config: RuntimeConfig,
) -> SimResult<Vec<(ir::Id, u64)>> {
    let mut sim = Simulator::new(ctx, config)?;
    let end = sim.run()?;
    sim.finish()?;
    log::info!("finished: {}, time: {end}", sim.is_finished());
    let top = ctx
        .entrypoint()
        .ok_or(SimError::UnknownClass(ctx.entrypoint))?;
    let mut values = vec![];
    for var in top.vars.iter() {
        let var = var.borrow();
        if var.is_local() || var.attributes.has(ir::BoolAttr::Generated) {
            continue;
        }
        values.push((var.name, sim.get(var.name.as_str())?));
    }
    Ok(values)
}

/// Run the compiler from the command line.
pub fn run_compiler(opts: Opts) -> SimResult<()> {
    let pm = PassManager::default_passes()?;

    // list all the available passes when --list-passes is given
    if opts.list_passes {
        println!("{}", pm.complete_help());
        return Ok(());
    }

    let mut ctx = demos::build(opts.design);
    ctx.extra_opts = opts.extra_opts.clone();
    pm.execute_plan(&mut ctx, &opts.plan(), &opts.disable_pass, opts.dump_ir)?;

    let out = &mut std::io::stdout();
    match opts.emit {
        Emit::Ir => ir::Printer::write_context(&ctx, out)?,
        Emit::Schedule => {
            let schedule = ctx.entrypoint().and_then(|top| top.schedule.as_ref());
            let Some(schedule) = schedule else {
                return Err(SimError::Unscheduled(ctx.entrypoint).into());
            };
            serde_json::to_writer_pretty(&mut *out, schedule)
                .map_err(|e| Error::misc(format!("Failed to write schedule: {e}")))?;
            writeln!(out)?;
        }
        Emit::Sim => {
            let config = RuntimeConfig::builder()
                .seed(opts.seed)
                .maybe_max_time(opts.max_time)
                .build();
            let values = simulate(&ctx, config)?;
            let json: serde_json::Map<String, serde_json::Value> = values
                .into_iter()
                .map(|(name, v)| (name.to_string(), v.into()))
                .collect();
            serde_json::to_writer_pretty(&mut *out, &json)
                .map_err(|e| Error::misc(format!("Failed to write values: {e}")))?;
            writeln!(out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmdline::Design;

    fn lowered(design: Design) -> ir::Context {
        let mut ctx = demos::build(design);
        lower(&mut ctx, &["all".to_string()], &[], false).unwrap();
        ctx
    }

    fn value(values: &[(ir::Id, u64)], name: &str) -> u64 {
        values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
            .unwrap()
    }

    #[test]
    fn every_design_is_scheduled() {
        for design in Design::ALL {
            let ctx = lowered(design);
            let top = ctx.entrypoint().unwrap();
            let schedule = top.schedule.as_ref().unwrap();
            assert!(
                schedule.act.trigger_index(&ir::Trigger::DynamicResume).is_some(),
                "{design}"
            );
        }
    }

    #[test]
    fn counter_runs_to_finish() {
        let values = simulate(&lowered(Design::Counter), RuntimeConfig::default())
            .unwrap();
        // Rising edges at 5, 15, ..., 95.
        assert_eq!(value(&values, "cnt"), 10);
        assert_eq!(value(&values, "next"), 11);
    }

    #[test]
    fn fork_join_values() {
        let values = simulate(&lowered(Design::ForkJoin), RuntimeConfig::default())
            .unwrap();
        assert_eq!(value(&values, "after_all"), 2);
        // Only the `b` branch of the second fork had finished.
        assert_eq!(value(&values, "after_any"), 3);
        // `a <= #10 b` sampled `b` before it was cleared.
        assert_eq!(value(&values, "a"), 2);
        assert_eq!(value(&values, "b"), 0);
    }

    #[test]
    fn force_values() {
        let values =
            simulate(&lowered(Design::Force), RuntimeConfig::default()).unwrap();
        assert_eq!(value(&values, "y"), 0xf5);
        assert_eq!(value(&values, "z"), 0xf5);
        assert_eq!(value(&values, "x"), 0xf5);
        assert_eq!(value(&values, "sum"), 0xf6);
    }

    #[test]
    fn handshake_consumes_everything() {
        let values =
            simulate(&lowered(Design::Handshake), RuntimeConfig::default()).unwrap();
        assert_eq!(value(&values, "produced"), 4);
        assert_eq!(value(&values, "consumed"), 4);
        assert_eq!(value(&values, "spare"), 0);
    }

    #[test]
    fn random_satisfies_hard_constraint() {
        let config = RuntimeConfig::builder().seed(7).build();
        let values = simulate(&lowered(Design::Random), config).unwrap();
        assert_eq!(value(&values, "ok"), 1);
        assert!(value(&values, "len") < 64);
    }
}
