//! Command line parsing for the strobe driver.
use argh::FromArgs;
use std::fmt::Display;
use std::str::FromStr;

/// Designs built into the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Design {
    /// Self-clocked counter with a combinational output.
    Counter,
    /// Fork with `join` and `join_any` consumers.
    ForkJoin,
    /// Overlapping partial forces and a release.
    Force,
    /// Producer and consumer sharing a semaphore.
    Handshake,
    /// Class with constrained random members.
    Random,
}

impl Design {
    pub const ALL: [Design; 5] = [
        Design::Counter,
        Design::ForkJoin,
        Design::Force,
        Design::Handshake,
        Design::Random,
    ];
}

impl FromStr for Design {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Design::ALL
            .into_iter()
            .find(|d| d.to_string() == s)
            .ok_or_else(|| {
                format!(
                    "unknown design `{s}`, expected one of: {}",
                    itertools::join(Design::ALL, ", ")
                )
            })
    }
}

impl Display for Design {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Design::Counter => "counter",
            Design::ForkJoin => "fork-join",
            Design::Force => "force",
            Design::Handshake => "handshake",
            Design::Random => "random",
        };
        write!(f, "{name}")
    }
}

/// What to print once the passes have run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Emit {
    /// The lowered program.
    #[default]
    Ir,
    /// The region schedule of the top-level module as JSON.
    Schedule,
    /// Simulate and print the final values of the top-level variables.
    Sim,
}

impl FromStr for Emit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ir" => Ok(Emit::Ir),
            "schedule" => Ok(Emit::Schedule),
            "sim" => Ok(Emit::Sim),
            _ => Err(format!("unknown output `{s}`, expected ir, schedule, or sim")),
        }
    }
}

#[derive(FromArgs, Debug)]
/// Lower the timing constructs of a design and schedule it.
pub struct Opts {
    /// design to compile
    #[argh(positional, default = "Design::Counter")]
    pub design: Design,

    /// output to produce: ir, schedule, or sim
    #[argh(option, short = 'e', long = "emit", default = "Emit::Ir")]
    pub emit: Emit,

    /// execute this pass or alias. Defaults to `all`
    #[argh(option, short = 'p', long = "pass")]
    pub pass: Vec<String>,

    /// disable pass during execution
    #[argh(option, short = 'd', long = "disable-pass")]
    pub disable_pass: Vec<String>,

    /// extra options passed to the passes, as `pass:opt=value`
    #[argh(option, short = 'x', long = "extra-opt")]
    pub extra_opts: Vec<String>,

    /// print the program after every pass
    #[argh(switch, long = "dump-ir")]
    pub dump_ir: bool,

    /// list all passes and aliases
    #[argh(switch, long = "list-passes")]
    pub list_passes: bool,

    /// seed for random values during simulation
    #[argh(option, long = "seed", default = "0")]
    pub seed: u64,

    /// stop the simulation once time would pass this bound
    #[argh(option, long = "max-time")]
    pub max_time: Option<u64>,

    /// logging level
    #[argh(option, long = "log-level", default = "log::LevelFilter::Warn")]
    pub log_level: log::LevelFilter,
}

impl Opts {
    /// Passes to run: the ones given on the command line, or `all`.
    pub fn plan(&self) -> Vec<String> {
        if self.pass.is_empty() {
            vec!["all".to_string()]
        } else {
            self.pass.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn design_names_round_trip() {
        for d in Design::ALL {
            assert_eq!(d.to_string().parse::<Design>(), Ok(d));
        }
        assert!("alu".parse::<Design>().unwrap_err().contains("fork-join"));
    }

    #[test]
    fn defaults() {
        let opts = Opts::from_args(&["strobe"], &["-x", "randomize-lower:attempts=8"])
            .unwrap();
        assert_eq!(opts.design, Design::Counter);
        assert_eq!(opts.emit, Emit::Ir);
        assert_eq!(opts.plan(), vec!["all".to_string()]);
        assert_eq!(opts.log_level, log::LevelFilter::Warn);
        assert_eq!(opts.extra_opts, vec!["randomize-lower:attempts=8"]);
    }

    #[test]
    fn simulation_options() {
        let opts = Opts::from_args(
            &["strobe"],
            &["force", "-e", "sim", "--seed", "3", "-p", "dynamic"],
        )
        .unwrap();
        assert_eq!(opts.design, Design::Force);
        assert_eq!(opts.emit, Emit::Sim);
        assert_eq!(opts.seed, 3);
        assert_eq!(opts.plan(), vec!["dynamic".to_string()]);
    }
}
