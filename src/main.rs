use strobe::{cmdline::Opts, driver};
use strobe_sim::SimResult;

fn main() -> SimResult<()> {
    let opts: Opts = argh::from_env();
    driver::init_logging(opts.log_level);
    driver::run_compiler(opts)
}
