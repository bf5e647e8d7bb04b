use anyhow::Result;

/// Maps an interface-kind call target's class identifier to the concrete
/// implementing class to analyze instead. Consulted only for interface
/// dispatch; a builder without a resolver looks interface targets up against
/// the interface type itself.
pub trait InterfaceResolver {
    fn resolve(&self, interface_class: &str) -> Result<String>;
}

impl<F> InterfaceResolver for F
where
    F: Fn(&str) -> String,
{
    fn resolve(&self, interface_class: &str) -> Result<String> {
        Ok(self(interface_class))
    }
}

/// The `<package>.impl.<Type>Impl` naming convention: the immediate package
/// component gains an `.impl` segment and the simple type name an `Impl`
/// suffix. Names with fewer than two segments only get the suffix.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImplSuffixConvention;

impl InterfaceResolver for ImplSuffixConvention {
    fn resolve(&self, interface_class: &str) -> Result<String> {
        let mut segments: Vec<&str> = interface_class.split('.').collect();
        if segments.len() < 2 {
            return Ok(format!("{interface_class}Impl"));
        }
        let package = format!("{}.impl", segments[segments.len() - 2]);
        let index = segments.len() - 2;
        segments[index] = package.as_str();
        Ok(format!("{}Impl", segments.join(".")))
    }
}
