//! API 类型定义

use crate::error::EngineError;
use hotscript_lang::{Binding, ExecuteOutput, Script, Value};
use std::sync::Arc;

/// 编译好的脚本和它自己的 Binding
///
/// 持有创建时的编译结果：之后脚本文件改变不会影响它，
/// 需要新版本时重新调用 [`Engine::create`](crate::Engine::create)。
/// Binding 在多次运行之间保留。
#[derive(Debug, Clone)]
pub struct PreparedScript {
    name: String,
    script: Arc<Script>,
    binding: Binding,
}

impl PreparedScript {
    pub fn new(name: impl Into<String>, script: Arc<Script>) -> Self {
        Self {
            name: name.into(),
            script,
            binding: Binding::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn script(&self) -> &Arc<Script> {
        &self.script
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn binding_mut(&mut self) -> &mut Binding {
        &mut self.binding
    }

    /// 设置一个输入变量
    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.binding.set(name, value);
        self
    }

    pub fn run(&mut self) -> Result<ExecuteOutput, EngineError> {
        self.script
            .run(&mut self.binding)
            .map_err(|source| EngineError::Runtime {
                script: self.name.clone(),
                source,
            })
    }
}
