//! Registry of lowering passes and the plans that run them.
use crate::traversal::{ConstructVisitor, DiagnosticPass, Named, Visitor};
use itertools::Itertools;
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;
use strobe_ir as ir;
use strobe_utils::{Error, MultiError};

pub type PassResult<T> = std::result::Result<T, MultiError>;

/// Runs one pass over the whole program.
pub type PassClosure = Box<dyn Fn(&mut ir::Context) -> PassResult<()>>;

struct Registered {
    run: PassClosure,
    help: String,
}

/// Passes known to the compiler, by name, and the aliases that group them
/// into pipelines.
#[derive(Default)]
pub struct PassManager {
    passes: BTreeMap<&'static str, Registered>,
    /// Aliases are stored fully expanded.
    aliases: BTreeMap<String, Vec<&'static str>>,
}

impl PassManager {
    /// Register a pass that fails on its first error.
    pub fn register_pass<P>(&mut self) -> PassResult<()>
    where
        P: Visitor + ConstructVisitor + Named,
    {
        self.insert::<P>(Box::new(|ctx| {
            P::do_pass_default(ctx)?;
            Ok(())
        }))
    }

    /// Register a pass that reports all of its errors together after the
    /// last module.
    pub fn register_diagnostic<P>(&mut self) -> PassResult<()>
    where
        P: Visitor + ConstructVisitor + Named + DiagnosticPass,
    {
        self.insert::<P>(Box::new(|ctx| {
            let mut visitor = <P as ConstructVisitor>::from(ctx)?;
            visitor.do_pass(ctx)?;
            visitor.diagnostics().check()
        }))
    }

    fn insert<P: Named>(&mut self, run: PassClosure) -> PassResult<()> {
        let name = P::name();
        if self.passes.contains_key(name) || self.aliases.contains_key(name) {
            return Err(Error::misc(format!("`{name}' is registered twice")).into());
        }
        let mut help = format!("- {name}: {}", P::description());
        for opt in P::opts() {
            help.push_str(&format!(
                "\n  * {}: {} (default: {})",
                opt.name(),
                opt.description(),
                opt.default()
            ));
        }
        self.passes.insert(name, Registered { run, help });
        Ok(())
    }

    /// Name `steps`, a list of passes and earlier aliases, as a pipeline.
    pub fn add_alias(&mut self, name: String, steps: Vec<String>) -> PassResult<()> {
        if self.aliases.contains_key(&name) || self.passes.contains_key(name.as_str()) {
            return Err(Error::misc(format!("`{name}' is registered twice")).into());
        }
        let expanded = self.expand(&steps).map_err(|e| {
            Error::misc(format!("alias `{name}': {}", e.message()))
        })?;
        self.aliases.insert(name, expanded);
        Ok(())
    }

    /// Replace every alias in `steps` by its passes.
    fn expand(&self, steps: &[String]) -> Result<Vec<&'static str>, Error> {
        let mut out = vec![];
        for step in steps {
            if let Some(passes) = self.aliases.get(step) {
                out.extend(passes.iter().copied());
            } else if let Some((name, _)) = self.passes.get_key_value(step.as_str()) {
                out.push(*name);
            } else {
                return Err(Error::misc(format!(
                    "unknown pass or alias `{step}'. Use --list-passes to see what is available"
                )));
            }
        }
        Ok(out)
    }

    /// The passes that `incl` names, in order, minus the ones `excl`
    /// names.
    pub fn plan(
        &self,
        incl: &[String],
        excl: &[String],
    ) -> PassResult<Vec<&'static str>> {
        let skip: HashSet<_> = self.expand(excl)?.into_iter().collect();
        let plan = self.expand(incl)?;
        for name in plan.iter().filter(|p| skip.contains(*p)) {
            log::info!("{name}: disabled");
        }
        Ok(plan.into_iter().filter(|p| !skip.contains(p)).collect())
    }

    /// Run the plan of `incl` and `excl` over `ctx`, optionally printing
    /// the program after every pass.
    pub fn execute_plan(
        &self,
        ctx: &mut ir::Context,
        incl: &[String],
        excl: &[String],
        dump_ir: bool,
    ) -> PassResult<()> {
        for name in self.plan(incl, excl)? {
            let start = Instant::now();
            (self.passes[name].run)(ctx)?;
            log::info!("{name}: {}ms", start.elapsed().as_millis());
            if dump_ir {
                println!("// after {name}");
                ir::Printer::write_context(ctx, &mut std::io::stdout())?;
            }
        }
        Ok(())
    }

    /// Help for one pass, or the pipeline an alias stands for.
    pub fn help_for(&self, name: &str) -> Option<String> {
        if let Some(pass) = self.passes.get(name) {
            return Some(pass.help.clone());
        }
        self.aliases
            .get(name)
            .map(|passes| format!("`{name}' runs: {}", passes.join(", ")))
    }

    /// Help for everything that is registered.
    pub fn complete_help(&self) -> String {
        let passes = self.passes.values().map(|p| p.help.as_str()).join("\n");
        let aliases = self
            .aliases
            .iter()
            .map(|(alias, passes)| format!("- {alias}: {}", passes.join(", ")))
            .join("\n");
        format!("Passes:\n{passes}\n\nAliases:\n{aliases}\n")
    }
}

/// Register an alias made of pass types and alias names.
///
/// ```ignore
/// register_alias!(pm, "dynamic", [MarkDynamic, ForkLower, CreateEvents]);
/// ```
#[macro_export]
macro_rules! register_alias {
    (@step $pass:ident) => {
        $pass::name().to_string()
    };

    (@step $alias:literal) => {
        $alias.to_string()
    };

    ($manager:expr, $alias:literal, [ $($step:tt),* $(,)? ]) => {
        $manager.add_alias($alias.to_string(), vec![
            $(register_alias!(@step $step)),*
        ])?;
    };
}
