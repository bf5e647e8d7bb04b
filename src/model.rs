use serde::Serialize;

/// Invocation opcode classification for a call site or declared method.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Virtual,
    Interface,
    Special,
    Static,
    Dynamic,
}

impl std::fmt::Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            CallKind::Virtual => "virtual",
            CallKind::Interface => "interface",
            CallKind::Special => "special",
            CallKind::Static => "static",
            CallKind::Dynamic => "dynamic",
        };
        f.write_str(text)
    }
}

/// A method reference as observed at a call site or in a method table.
///
/// `kind` and `return_type` are informational; method identity for caching
/// and cycle detection is the [`MethodKey`] projection only.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CallTarget {
    pub kind: CallKind,
    pub class_name: String,
    pub method_name: String,
    pub params: Vec<String>,
    pub return_type: String,
}

impl CallTarget {
    pub fn key(&self) -> MethodKey {
        MethodKey {
            class_name: self.class_name.clone(),
            method_name: self.method_name.clone(),
            params: self.params.clone(),
        }
    }
}

/// Structural method identity: owning class, name, and ordered parameter
/// signature. Never derived from mutable graph payloads.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize)]
pub struct MethodKey {
    pub class_name: String,
    pub method_name: String,
    pub params: Vec<String>,
}

impl std::fmt::Display for MethodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}({})",
            self.class_name,
            self.method_name,
            self.params.join(",")
        )
    }
}

/// A declared method together with its immediate, unexpanded call sites in
/// program order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MethodInfo {
    pub target: CallTarget,
    pub calls: Vec<CallTarget>,
}

impl MethodInfo {
    pub fn key(&self) -> MethodKey {
        self.target.key()
    }
}

/// A parsed class: dotted identifier plus declared methods in declaration
/// order. Filter-rejected and abstract/native methods are never present.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassInfo {
    pub class_name: String,
    pub methods: Vec<MethodInfo>,
}

impl ClassInfo {
    /// Exact signature match: name and full ordered parameter signature,
    /// descriptor for descriptor. No overload resolution and no supertype
    /// search; inherited-not-redeclared targets legitimately miss.
    pub fn find_method(&self, method_name: &str, params: &[String]) -> Option<&MethodInfo> {
        self.methods
            .iter()
            .find(|m| m.target.method_name == method_name && m.target.params == params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(kind: CallKind, class: &str, method: &str, params: &[&str]) -> CallTarget {
        CallTarget {
            kind,
            class_name: class.to_string(),
            method_name: method.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            return_type: "V".to_string(),
        }
    }

    #[test]
    fn key_ignores_kind_and_return_type() {
        let virtual_site = target(CallKind::Virtual, "com.acme.Svc", "go", &["I"]);
        let mut special_site = target(CallKind::Special, "com.acme.Svc", "go", &["I"]);
        special_site.return_type = "Ljava/lang/String;".to_string();

        assert_eq!(virtual_site.key(), special_site.key());
    }

    #[test]
    fn find_method_requires_exact_parameter_signature() {
        let class = ClassInfo {
            class_name: "com.acme.Svc".to_string(),
            methods: vec![
                MethodInfo {
                    target: target(CallKind::Virtual, "com.acme.Svc", "go", &["I"]),
                    calls: Vec::new(),
                },
                MethodInfo {
                    target: target(CallKind::Virtual, "com.acme.Svc", "go", &["I", "J"]),
                    calls: Vec::new(),
                },
            ],
        };

        let matched = class
            .find_method("go", &["I".to_string(), "J".to_string()])
            .expect("overload on (I,J)");
        assert_eq!(matched.target.params, vec!["I", "J"]);
        assert!(class.find_method("go", &["J".to_string()]).is_none());
        assert!(class.find_method("stop", &["I".to_string()]).is_none());
    }
}
