use std::str::FromStr;

use anyhow::{Context, Result, bail};
use jclassfile::attributes::Attribute;
use jclassfile::class_file::{self, ClassFlags};
use jclassfile::constant_pool::ConstantPool;
use jclassfile::methods::MethodFlags;
use jdescriptor::MethodDescriptor;

use crate::extract::ExtractError;
use crate::filter::CallFilter;
use crate::model::{CallKind, CallTarget, ClassInfo, MethodInfo};
use crate::opcodes;

/// Decode one compiled class into its declared methods and their immediate
/// call sites, applying `filter` to declared methods before their bodies are
/// scanned and to every call-site target. Abstract and native methods are
/// never included.
///
/// The class file structure is decoded by `jclassfile`; only the bytecode
/// of each `Code` attribute is walked here.
pub(crate) fn parse_class(
    class_name: &str,
    data: &[u8],
    filter: &dyn CallFilter,
) -> Result<ClassInfo, ExtractError> {
    match parse_impl(data, filter) {
        Ok(info) => Ok(info),
        Err(ParseFail::Malformed(reason)) => Err(ExtractError::Malformed {
            class_name: class_name.to_string(),
            reason,
        }),
        Err(ParseFail::Callback(reason)) => Err(ExtractError::Callback(reason)),
    }
}

/// Structural parse failures are non-fatal to a build; filter failures must
/// propagate and abort it, so the two are kept apart from the start.
enum ParseFail {
    Malformed(anyhow::Error),
    Callback(anyhow::Error),
}

impl From<anyhow::Error> for ParseFail {
    fn from(error: anyhow::Error) -> Self {
        ParseFail::Malformed(error)
    }
}

fn parse_impl(data: &[u8], filter: &dyn CallFilter) -> Result<ClassInfo, ParseFail> {
    let class = class_file::parse(data).context("failed to decode class file")?;
    let pool = Pool::new(class.constant_pool());
    let class_name = pool.class_name(class.this_class())?;
    let interface = class.access_flags().contains(ClassFlags::ACC_INTERFACE);

    let mut methods = Vec::new();
    for method in class.methods() {
        if method
            .access_flags()
            .intersects(MethodFlags::ACC_ABSTRACT | MethodFlags::ACC_NATIVE)
        {
            continue;
        }
        let method_name = pool.utf8(method.name_index())?.to_string();
        if !filter
            .include(&class_name, &method_name)
            .map_err(ParseFail::Callback)?
        {
            continue;
        }
        let (params, return_type) = split_method_descriptor(pool.utf8(method.descriptor_index())?)?;
        let kind = if interface {
            CallKind::Interface
        } else if method.access_flags().contains(MethodFlags::ACC_STATIC) {
            CallKind::Static
        } else {
            CallKind::Virtual
        };
        let code = method.attributes().iter().find_map(|attribute| match attribute {
            Attribute::Code { code, .. } => Some(code.as_slice()),
            _ => None,
        });
        let calls = match code {
            Some(code) => scan_calls(code, &pool, filter)?,
            None => Vec::new(),
        };
        methods.push(MethodInfo {
            target: CallTarget {
                kind,
                class_name: class_name.clone(),
                method_name,
                params,
                return_type,
            },
            calls,
        });
    }

    Ok(ClassInfo {
        class_name,
        methods,
    })
}

/// Walk method bytecode instruction by instruction, keeping filtered
/// invocation targets in program order.
fn scan_calls(
    code: &[u8],
    pool: &Pool<'_>,
    filter: &dyn CallFilter,
) -> Result<Vec<CallTarget>, ParseFail> {
    let mut calls = Vec::new();
    let mut offset = 0;
    while offset < code.len() {
        let opcode = code[offset];
        let site = match opcode {
            opcodes::INVOKEVIRTUAL | opcodes::INVOKESPECIAL | opcodes::INVOKESTATIC => {
                let index = opcodes::read_u16(code, offset + 1)?;
                let (owner, name, descriptor) = pool.method_ref(index)?;
                let kind = match opcode {
                    opcodes::INVOKEVIRTUAL => CallKind::Virtual,
                    opcodes::INVOKESPECIAL => CallKind::Special,
                    _ => CallKind::Static,
                };
                Some((kind, owner, name, descriptor))
            }
            opcodes::INVOKEINTERFACE => {
                let index = opcodes::read_u16(code, offset + 1)?;
                let (owner, name, descriptor) = pool.method_ref(index)?;
                Some((CallKind::Interface, owner, name, descriptor))
            }
            opcodes::INVOKEDYNAMIC => {
                let index = opcodes::read_u16(code, offset + 1)?;
                let (name, descriptor) = pool.dynamic_ref(index)?;
                // Dynamic sites have no owning class; the call-site method
                // type stands in as the identifier.
                Some((CallKind::Dynamic, descriptor.clone(), name, descriptor))
            }
            _ => None,
        };

        if let Some((kind, owner, name, descriptor)) = site {
            if filter
                .include(&owner, &name)
                .map_err(ParseFail::Callback)?
            {
                let (params, return_type) = split_method_descriptor(&descriptor)?;
                calls.push(CallTarget {
                    kind,
                    class_name: owner,
                    method_name: name,
                    params,
                    return_type,
                });
            }
        }

        offset += opcodes::instruction_length(code, offset)?;
    }
    Ok(calls)
}

/// Split `(I[JLjava/lang/String;)V` into parameter descriptors and the
/// return descriptor. Parameters stay in raw descriptor form; `jdescriptor`
/// round-trips them, so parsing here is validation plus segmentation.
fn split_method_descriptor(descriptor: &str) -> Result<(Vec<String>, String)> {
    let parsed = MethodDescriptor::from_str(descriptor)
        .with_context(|| format!("not a method descriptor: {descriptor}"))?;
    let params = parsed
        .parameter_types()
        .iter()
        .map(ToString::to_string)
        .collect();
    Ok((params, parsed.return_type().to_string()))
}

/// Lookup helpers over the decoded constant pool. Internal slashed class
/// names are converted to dotted form at this boundary.
struct Pool<'a> {
    entries: &'a [ConstantPool],
}

impl<'a> Pool<'a> {
    fn new(entries: &'a [ConstantPool]) -> Self {
        Self { entries }
    }

    fn entry(&self, index: u16) -> Result<&'a ConstantPool> {
        self.entries
            .get(index as usize)
            .with_context(|| format!("constant pool index {index} out of range"))
    }

    fn utf8(&self, index: u16) -> Result<&'a str> {
        match self.entry(index)? {
            ConstantPool::Utf8 { value } => Ok(value),
            _ => bail!("constant pool index {index} is not a Utf8 entry"),
        }
    }

    fn class_name(&self, index: u16) -> Result<String> {
        match self.entry(index)? {
            ConstantPool::Class { name_index } => Ok(self.utf8(*name_index)?.replace('/', ".")),
            _ => bail!("constant pool index {index} is not a Class entry"),
        }
    }

    fn name_and_type(&self, index: u16) -> Result<(String, String)> {
        match self.entry(index)? {
            ConstantPool::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((
                self.utf8(*name_index)?.to_string(),
                self.utf8(*descriptor_index)?.to_string(),
            )),
            _ => bail!("constant pool index {index} is not a NameAndType entry"),
        }
    }

    fn method_ref(&self, index: u16) -> Result<(String, String, String)> {
        match self.entry(index)? {
            ConstantPool::Methodref {
                class_index,
                name_and_type_index,
            }
            | ConstantPool::InterfaceMethodref {
                class_index,
                name_and_type_index,
            } => {
                let owner = self.class_name(*class_index)?;
                let (name, descriptor) = self.name_and_type(*name_and_type_index)?;
                Ok((owner, name, descriptor))
            }
            _ => bail!("constant pool index {index} is not a method reference"),
        }
    }

    fn dynamic_ref(&self, index: u16) -> Result<(String, String)> {
        match self.entry(index)? {
            ConstantPool::InvokeDynamic {
                name_and_type_index,
                ..
            }
            | ConstantPool::Dynamic {
                name_and_type_index,
                ..
            } => self.name_and_type(*name_and_type_index),
            _ => bail!("constant pool index {index} is not a dynamic call site"),
        }
    }
}
