//! Defines the default passes available to [PassManager].
use crate::passes::{
    AddTriggers, AliasResolve, CreateEvents, ForceLower, ForkLower,
    IntraAssignDelay, MarkDynamic, RandomizeLower, RegionSchedule, SelOpt,
    VirtIfaceTrigger,
};
use crate::traversal::Named;
use crate::{pass_manager::PassManager, register_alias};
use strobe_utils::MultiError;

impl PassManager {
    pub fn default_passes() -> Result<Self, MultiError> {
        // Construct the pass manager and register all passes.
        let mut pm = PassManager::default();

        // Resolution
        pm.register_diagnostic::<AliasResolve>()?;

        // Dynamic scheduling
        pm.register_pass::<MarkDynamic>()?;
        pm.register_pass::<IntraAssignDelay>()?;
        pm.register_pass::<ForkLower>()?;
        pm.register_diagnostic::<CreateEvents>()?;
        pm.register_pass::<AddTriggers>()?;

        // Lowering passes
        pm.register_diagnostic::<ForceLower>()?;
        pm.register_pass::<RandomizeLower>()?;
        pm.register_pass::<VirtIfaceTrigger>()?;
        pm.register_pass::<SelOpt>()?;

        // Scheduling
        pm.register_pass::<RegionSchedule>()?;

        register_alias!(
            pm,
            "dynamic",
            [
                MarkDynamic,
                IntraAssignDelay,
                ForkLower, // Branches become suspendable tasks
                CreateEvents,
                AddTriggers,
            ]
        );
        register_alias!(
            pm,
            "lower",
            [ForceLower, RandomizeLower, VirtIfaceTrigger, SelOpt]
        );
        register_alias!(
            pm,
            "all",
            [AliasResolve, "dynamic", "lower", RegionSchedule]
        );

        Ok(pm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_order() {
        let pm = PassManager::default_passes().unwrap();
        let order = pm.plan(&["all".to_string()], &[]).unwrap();
        assert_eq!(
            order,
            vec![
                "alias-resolve",
                "mark-dynamic",
                "intra-assign-delay",
                "fork-lower",
                "create-events",
                "add-triggers",
                "force-lower",
                "randomize-lower",
                "virt-iface-trigger",
                "sel-opt",
                "region-schedule",
            ]
        );
        assert!(pm.complete_help().contains("* attempts"));
        assert_eq!(
            pm.plan(&["all".to_string()], &["dynamic".to_string()])
                .unwrap()
                .len(),
            6
        );
        assert!(pm.help_for("lower").unwrap().starts_with("`lower' runs: force-lower"));
    }

    #[test]
    fn unknown_passes_are_rejected() {
        let pm = PassManager::default_passes().unwrap();
        let mut ctx = strobe_ir::Context::default();
        let res = pm.execute_plan(&mut ctx, &["no-such-pass".to_string()], &[], false);
        assert!(res.is_err());
    }
}
