use crate::Id;
use std::collections::{HashMap, HashSet};

/// Generates fresh names per prefix, never returning a name that is already
/// defined in the scope it was created for.
#[derive(Clone, Debug, Default)]
pub struct NameGenerator {
    name_hash: HashMap<Id, i64>,
    generated_names: HashSet<Id>,
}

impl NameGenerator {
    /// Create a NameGenerator where `names` are already defined so that this
    /// generator will never generate those names.
    pub fn with_prev_defined_names(names: HashSet<Id>) -> Self {
        NameGenerator {
            generated_names: names,
            name_hash: HashMap::default(),
        }
    }

    /// Record names defined elsewhere.
    pub fn add_names(&mut self, names: impl IntoIterator<Item = Id>) {
        self.generated_names.extend(names)
    }

    /// Returns a new name that starts with `prefix`.
    /// ```
    /// # use strobe_utils::NameGenerator;
    /// let mut namegen = NameGenerator::default();
    /// assert_eq!(namegen.gen_name("tmp"), "tmp");
    /// assert_eq!(namegen.gen_name("tmp"), "tmp0");
    /// ```
    pub fn gen_name<S>(&mut self, prefix: S) -> Id
    where
        S: Into<Id>,
    {
        let prefix: Id = prefix.into();
        let count = self.name_hash.entry(prefix).or_insert(-1);
        loop {
            let name = if *count == -1 {
                prefix
            } else {
                Id::from(format!("{prefix}{count}"))
            };
            *count += 1;
            if self.generated_names.insert(name) {
                return name;
            }
        }
    }

    /// Returns a fresh name of the form `{prefix}{n}{suffix}` with a counter
    /// shared by every use of `prefix`.
    pub fn gen_numbered<S: AsRef<str>>(&mut self, prefix: &str, suffix: S) -> Id {
        let key = Id::from(format!("{prefix}#"));
        loop {
            let count = self.name_hash.entry(key).or_insert(0);
            let name = Id::from(format!("{prefix}{count}{}", suffix.as_ref()));
            *count += 1;
            if self.generated_names.insert(name) {
                return name;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_defined_names() {
        let mut ng = NameGenerator::with_prev_defined_names(
            ["x".into(), "x0".into()].into_iter().collect(),
        );
        assert_eq!(ng.gen_name("x"), "x1");
        assert_eq!(ng.gen_numbered("__Vtmp", "__a"), "__Vtmp0__a");
        assert_eq!(ng.gen_numbered("__Vtmp", "__a"), "__Vtmp1__a");
    }
}
