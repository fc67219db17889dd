use super::Visitor;
use itertools::Itertools;
use linked_hash_map::LinkedHashMap;
use strobe_ir as ir;
use strobe_utils::StrobeResult;

/// Value of a pass option.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseVal {
    Bool(bool),
    Num(i64),
}

impl ParseVal {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParseVal::Bool(b) => Some(*b),
            ParseVal::Num(_) => None,
        }
    }

    pub fn as_num(&self) -> Option<i64> {
        match self {
            ParseVal::Num(n) => Some(*n),
            ParseVal::Bool(_) => None,
        }
    }

    /// The value as a non-negative number.
    pub fn pos_num(&self) -> Option<u64> {
        self.as_num().and_then(|n| u64::try_from(n).ok())
    }
}

impl std::fmt::Display for ParseVal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseVal::Bool(b) => write!(f, "{b}"),
            ParseVal::Num(n) => write!(f, "{n}"),
        }
    }
}

/// An option accepted by a pass, given on the command line as
/// `-x pass:name=value`.
pub struct PassOpt {
    name: &'static str,
    description: &'static str,
    default: ParseVal,
    parse: fn(&str) -> Option<ParseVal>,
}

impl PassOpt {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        default: ParseVal,
        parse: fn(&str) -> Option<ParseVal>,
    ) -> Self {
        Self {
            name,
            description,
            default,
            parse,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn description(&self) -> &'static str {
        self.description
    }

    pub const fn default(&self) -> &ParseVal {
        &self.default
    }

    pub fn parse_bool(s: &str) -> Option<ParseVal> {
        s.parse::<bool>().ok().map(ParseVal::Bool)
    }

    pub fn parse_num(s: &str) -> Option<ParseVal> {
        s.parse::<i64>().ok().map(ParseVal::Num)
    }
}

/// Interpret one `pass:name[=value]` string. Options meant for other passes
/// yield `None`; unknown names and unparsable values are reported and
/// skipped. A bare name sets a boolean option.
fn parse_extra_opt(
    pass: &str,
    opts: &[PassOpt],
    raw: &str,
) -> Option<(&'static str, ParseVal)> {
    let (target, rest) = raw.split_once(':')?;
    if target != pass {
        return None;
    }
    let (name, value) = match rest.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (rest, None),
    };
    let Some(opt) = opts.iter().find(|o| o.name == name) else {
        log::warn!("Ignoring unknown option for pass `{pass}`: {name}");
        return None;
    };
    let Some(value) = value else {
        return Some((opt.name, ParseVal::Bool(true)));
    };
    match (opt.parse)(value) {
        Some(v) => Some((opt.name, v)),
        None => {
            log::warn!("Ignoring invalid value for option `{pass}:{name}`: {value}");
            None
        }
    }
}

/// Names and describes a pass. [`PassManager`](crate::pass_manager::PassManager)
/// registers passes and resolves plans by these names.
///
/// Kept apart from [`Visitor`] because none of the methods take `self`.
pub trait Named {
    /// Name used on the command line and in aliases.
    fn name() -> &'static str;
    /// One line description for the help output.
    fn description() -> &'static str;
    /// Options the pass accepts.
    fn opts() -> Vec<PassOpt> {
        vec![]
    }
}

/// Builds a visitor from the whole [ir::Context] before any module is
/// traversed. Passes that need nothing from the context get this for free
/// through [Default].
pub trait ConstructVisitor {
    /// Values of every option of the pass: the ones given in
    /// [ir::Context::extra_opts], the defaults for the rest. Later
    /// occurrences of an option win.
    fn get_opts(ctx: &ir::Context) -> LinkedHashMap<&'static str, ParseVal>
    where
        Self: Named,
    {
        let opts = Self::opts();
        let pass = Self::name();
        let mut values: LinkedHashMap<&'static str, ParseVal> = opts
            .iter()
            .map(|o| (o.name, o.default))
            .collect();
        let given = ctx
            .extra_opts
            .iter()
            .filter_map(|raw| parse_extra_opt(pass, &opts, raw))
            .collect_vec();
        if !given.is_empty() {
            log::debug!(
                "{pass}: {}",
                given.iter().map(|(o, v)| format!("{o}={v}")).join(", ")
            );
        }
        values.extend(given);
        values
    }

    fn from(_ctx: &ir::Context) -> StrobeResult<Self>
    where
        Self: Sized;

    /// Reset per-module state. Called before each module is traversed.
    fn clear_data(&mut self);
}

impl<T: Default + Sized + Visitor> ConstructVisitor for T {
    fn from(_ctx: &ir::Context) -> StrobeResult<Self> {
        Ok(T::default())
    }

    fn clear_data(&mut self) {
        *self = T::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> Vec<PassOpt> {
        vec![
            PassOpt::new("limit", "", ParseVal::Num(100), PassOpt::parse_num),
            PassOpt::new("fast", "", ParseVal::Bool(false), PassOpt::parse_bool),
        ]
    }

    #[test]
    fn extra_opts_are_matched_by_pass() {
        let opts = opts();
        assert_eq!(
            parse_extra_opt("p", &opts, "p:limit=7"),
            Some(("limit", ParseVal::Num(7)))
        );
        assert_eq!(
            parse_extra_opt("p", &opts, "p:fast"),
            Some(("fast", ParseVal::Bool(true)))
        );
        assert_eq!(parse_extra_opt("p", &opts, "q:limit=7"), None);
        assert_eq!(parse_extra_opt("p", &opts, "p:limit=seven"), None);
        assert_eq!(parse_extra_opt("p", &opts, "p:slow"), None);
    }

    #[test]
    fn numbers_and_flags() {
        assert_eq!(ParseVal::Num(-1).pos_num(), None);
        assert_eq!(ParseVal::Num(3).pos_num(), Some(3));
        assert_eq!(ParseVal::Bool(true).as_num(), None);
        assert_eq!(ParseVal::Bool(true).as_bool(), Some(true));
    }
}
