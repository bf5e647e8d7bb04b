use anyhow::Result;

/// Predicate deciding whether a (class, method) pair participates in the
/// analysis at all. Applied to declared methods before their bodies are
/// scanned and to every call-site target; rejected targets are omitted
/// entirely, not even recorded as leaves.
///
/// A failing filter aborts the whole build, so fallible predicates should
/// report their own failures rather than panic.
pub trait CallFilter {
    fn include(&self, class_name: &str, method_name: &str) -> Result<bool>;
}

impl<F> CallFilter for F
where
    F: Fn(&str, &str) -> bool,
{
    fn include(&self, class_name: &str, method_name: &str) -> Result<bool> {
        Ok(self(class_name, method_name))
    }
}

/// Filter that keeps everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct IncludeAll;

impl CallFilter for IncludeAll {
    fn include(&self, _class_name: &str, _method_name: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Filter that keeps classes under any of the given dotted package prefixes.
#[derive(Clone, Debug)]
pub struct PrefixFilter {
    prefixes: Vec<String>,
}

impl PrefixFilter {
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }
}

impl CallFilter for PrefixFilter {
    fn include(&self, class_name: &str, _method_name: &str) -> Result<bool> {
        Ok(self
            .prefixes
            .iter()
            .any(|prefix| class_name.starts_with(prefix.as_str())))
    }
}
