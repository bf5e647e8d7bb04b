//! Shared test fixtures: a byte-level class file assembler and an in-memory
//! extractor honoring the filter contract.

use std::collections::HashMap;

use crate::extract::{ExtractError, MethodExtractor};
use crate::filter::CallFilter;
use crate::model::{CallKind, CallTarget, ClassInfo, MethodInfo};

pub(crate) const ACC_PUBLIC: u16 = 0x0001;
pub(crate) const ACC_STATIC: u16 = 0x0008;
pub(crate) const ACC_INTERFACE: u16 = 0x0200;
pub(crate) const ACC_ABSTRACT: u16 = 0x0400;

/// Assembles a minimal, structurally valid class file one pool entry at a
/// time. Indices are 1-based as in the wire format.
pub(crate) struct ClassFileBuilder {
    pool: Vec<Vec<u8>>,
    slots: u16,
    class_access: u16,
    this_class: u16,
    super_class: u16,
    code_attr_name: u16,
    methods: Vec<Vec<u8>>,
}

impl ClassFileBuilder {
    pub(crate) fn new(internal_name: &str) -> Self {
        let mut builder = Self {
            pool: Vec::new(),
            slots: 0,
            class_access: ACC_PUBLIC | 0x0020, // ACC_SUPER
            this_class: 0,
            super_class: 0,
            code_attr_name: 0,
            methods: Vec::new(),
        };
        builder.this_class = builder.class(internal_name);
        builder.super_class = builder.class("java/lang/Object");
        builder.code_attr_name = builder.utf8("Code");
        builder
    }

    pub(crate) fn interface(mut self) -> Self {
        self.class_access = ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT;
        self
    }

    fn push(&mut self, entry: Vec<u8>, slots: u16) -> u16 {
        self.pool.push(entry);
        self.slots += slots;
        self.slots - slots + 1
    }

    pub(crate) fn utf8(&mut self, text: &str) -> u16 {
        let mut entry = vec![1u8];
        entry.extend((text.len() as u16).to_be_bytes());
        entry.extend(text.as_bytes());
        self.push(entry, 1)
    }

    pub(crate) fn class(&mut self, internal_name: &str) -> u16 {
        let name_index = self.utf8(internal_name);
        let mut entry = vec![7u8];
        entry.extend(name_index.to_be_bytes());
        self.push(entry, 1)
    }

    /// Long entries occupy two pool slots but encode once.
    pub(crate) fn long(&mut self, value: i64) -> u16 {
        let mut entry = vec![5u8];
        entry.extend(value.to_be_bytes());
        self.push(entry, 2)
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let mut entry = vec![12u8];
        entry.extend(name_index.to_be_bytes());
        entry.extend(descriptor_index.to_be_bytes());
        self.push(entry, 1)
    }

    fn reference(&mut self, tag: u8, owner_internal: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(owner_internal);
        let nat_index = self.name_and_type(name, descriptor);
        let mut entry = vec![tag];
        entry.extend(class_index.to_be_bytes());
        entry.extend(nat_index.to_be_bytes());
        self.push(entry, 1)
    }

    pub(crate) fn method_ref(&mut self, owner_internal: &str, name: &str, descriptor: &str) -> u16 {
        self.reference(10, owner_internal, name, descriptor)
    }

    pub(crate) fn interface_method_ref(
        &mut self,
        owner_internal: &str,
        name: &str,
        descriptor: &str,
    ) -> u16 {
        self.reference(11, owner_internal, name, descriptor)
    }

    pub(crate) fn invoke_dynamic(&mut self, name: &str, descriptor: &str) -> u16 {
        let nat_index = self.name_and_type(name, descriptor);
        let mut entry = vec![18u8, 0, 0];
        entry.extend(nat_index.to_be_bytes());
        self.push(entry, 1)
    }

    pub(crate) fn add_method(&mut self, access: u16, name: &str, descriptor: &str, code: &[u8]) {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let mut body = Vec::new();
        body.extend(access.to_be_bytes());
        body.extend(name_index.to_be_bytes());
        body.extend(descriptor_index.to_be_bytes());
        if access & (ACC_ABSTRACT | 0x0100) != 0 {
            body.extend(0u16.to_be_bytes()); // no attributes
        } else {
            body.extend(1u16.to_be_bytes());
            body.extend(self.code_attr_name.to_be_bytes());
            body.extend(((12 + code.len()) as u32).to_be_bytes());
            body.extend(8u16.to_be_bytes()); // max_stack
            body.extend(8u16.to_be_bytes()); // max_locals
            body.extend((code.len() as u32).to_be_bytes());
            body.extend(code);
            body.extend(0u16.to_be_bytes()); // exception table
            body.extend(0u16.to_be_bytes()); // code attributes
        }
        self.methods.push(body);
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend(0xCAFE_BABEu32.to_be_bytes());
        data.extend(0u16.to_be_bytes()); // minor
        data.extend(52u16.to_be_bytes()); // major: Java 8
        data.extend((self.slots + 1).to_be_bytes());
        for entry in &self.pool {
            data.extend(entry);
        }
        data.extend(self.class_access.to_be_bytes());
        data.extend(self.this_class.to_be_bytes());
        data.extend(self.super_class.to_be_bytes());
        data.extend(0u16.to_be_bytes()); // interfaces
        data.extend(0u16.to_be_bytes()); // fields
        data.extend((self.methods.len() as u16).to_be_bytes());
        for method in &self.methods {
            data.extend(method);
        }
        data.extend(0u16.to_be_bytes()); // class attributes
        data
    }
}

/// Three-byte invoke instruction (virtual, special, static).
pub(crate) fn invoke(opcode: u8, index: u16) -> Vec<u8> {
    let mut code = vec![opcode];
    code.extend(index.to_be_bytes());
    code
}

/// Five-byte invoke instruction (interface, dynamic).
pub(crate) fn invoke_wide(opcode: u8, index: u16, count: u8) -> Vec<u8> {
    let mut code = vec![opcode];
    code.extend(index.to_be_bytes());
    code.push(count);
    code.push(0);
    code
}

pub(crate) fn target(kind: CallKind, class_name: &str, method_name: &str) -> CallTarget {
    CallTarget {
        kind,
        class_name: class_name.to_string(),
        method_name: method_name.to_string(),
        params: Vec::new(),
        return_type: "V".to_string(),
    }
}

pub(crate) fn method(class_name: &str, method_name: &str, calls: Vec<CallTarget>) -> MethodInfo {
    MethodInfo {
        target: target(CallKind::Virtual, class_name, method_name),
        calls,
    }
}

pub(crate) fn class_info(class_name: &str, methods: Vec<MethodInfo>) -> ClassInfo {
    ClassInfo {
        class_name: class_name.to_string(),
        methods,
    }
}

/// In-memory extractor over fixed [`ClassInfo`] values. Applies the filter
/// the way a real extractor must and logs every invocation so tests can
/// assert the at-most-once property.
#[derive(Default)]
pub(crate) struct FakeExtractor {
    classes: HashMap<String, ClassInfo>,
    pub(crate) extracted: Vec<String>,
}

impl FakeExtractor {
    pub(crate) fn new(classes: Vec<ClassInfo>) -> Self {
        Self {
            classes: classes
                .into_iter()
                .map(|info| (info.class_name.clone(), info))
                .collect(),
            extracted: Vec::new(),
        }
    }
}

impl MethodExtractor for FakeExtractor {
    fn extract(
        &mut self,
        class_name: &str,
        filter: &dyn CallFilter,
    ) -> Result<ClassInfo, ExtractError> {
        self.extracted.push(class_name.to_string());
        let Some(info) = self.classes.get(class_name) else {
            return Err(ExtractError::NotFound(class_name.to_string()));
        };
        let mut methods = Vec::new();
        for declared in &info.methods {
            if !filter
                .include(&info.class_name, &declared.target.method_name)
                .map_err(ExtractError::Callback)?
            {
                continue;
            }
            let mut calls = Vec::new();
            for site in &declared.calls {
                if filter
                    .include(&site.class_name, &site.method_name)
                    .map_err(ExtractError::Callback)?
                {
                    calls.push(site.clone());
                }
            }
            methods.push(MethodInfo {
                target: declared.target.clone(),
                calls,
            });
        }
        Ok(ClassInfo {
            class_name: info.class_name.clone(),
            methods,
        })
    }
}
