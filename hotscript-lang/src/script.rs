//! 与脚本缓存的对接：[`LangCompiler`] 和 [`Script`]
//!
//! 编译入口脚本时，import 的模块通过 [`CompileContext`] 加载，因此每个被
//! 导入文件都会作为依赖记录下来，修改任何一个都会让缓存重新编译入口脚本。

use crate::ast::Module;
use crate::chunk::{ModuleChunk, Program};
use crate::codegen::compile_chunk;
use crate::error::CompileError;
use crate::parser::{parse, parse_module};
use crate::vm::{Binding, ExecuteOutput, Vm};
use hotscript_cache::{module_resource_name, BoxError, CompileContext, Compiler, Executable};
use hotscript_config::LimitConfig;
use std::collections::HashMap;
use tracing::debug;

const TARGET: &str = "hotscript::compiler";

/// 编译完成、可重复执行的脚本
#[derive(Debug, Clone)]
pub struct Script {
    name: String,
    program: Program,
    limits: LimitConfig,
}

impl Script {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn limits(&self) -> &LimitConfig {
        &self.limits
    }

    /// 在给定的 Binding 上执行
    pub fn run(&self, binding: &mut Binding) -> Result<ExecuteOutput, crate::RuntimeError> {
        debug!(target: "hotscript::vm", script = %self.name, "running script");
        Vm::new(&self.program, &self.limits).run(binding)
    }
}

impl Executable for Script {
    type Bindings = Binding;
    type Output = ExecuteOutput;

    fn execute(&self, bindings: &mut Binding) -> Result<ExecuteOutput, BoxError> {
        Ok(self.run(bindings)?)
    }
}

/// hotscript 语言编译器
#[derive(Debug, Clone, Default)]
pub struct LangCompiler {
    limits: LimitConfig,
}

impl LangCompiler {
    pub fn new(limits: LimitConfig) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &LimitConfig {
        &self.limits
    }

    /// 编译入口脚本及其导入的全部模块
    pub fn compile_script(
        &self,
        ctx: &mut CompileContext<'_>,
        source: &str,
    ) -> Result<Script, CompileError> {
        let name = ctx.script_name().to_string();
        let entry_ast = parse(source)?;

        let mut linker = Linker {
            stack: vec![(name.clone(), name.clone())],
            ctx,
            modules: Vec::new(),
            indices: HashMap::new(),
        };
        let imports = linker.resolve_imports(&entry_ast)?;
        let entry = compile_chunk(&entry_ast, &imports)?;
        let modules = linker.modules;

        debug!(
            target: TARGET,
            script = %name,
            modules = modules.len(),
            bytes = entry.code.len(),
            "compiled"
        );
        Ok(Script {
            name,
            program: Program { entry, modules },
            limits: self.limits.clone(),
        })
    }
}

impl Compiler for LangCompiler {
    type Unit = Script;

    fn compile(&self, ctx: &mut CompileContext<'_>, source: &str) -> Result<Script, BoxError> {
        Ok(self.compile_script(ctx, source)?)
    }
}

/// 解析 import，按依赖顺序收集模块代码
struct Linker<'c, 'a> {
    ctx: &'c mut CompileContext<'a>,
    /// 正在编译的 (模块名, 资源名)，用于检测循环导入
    stack: Vec<(String, String)>,
    modules: Vec<ModuleChunk>,
    /// 模块名 -> modules 中的索引；同一次编译中每个模块只加载一次
    indices: HashMap<String, u8>,
}

impl Linker<'_, '_> {
    fn resolve_imports(&mut self, module: &Module) -> Result<HashMap<String, u8>, CompileError> {
        let mut resolved = HashMap::new();
        for import in module.imports() {
            let index = self.link(&import.module, import.coordinate)?;
            resolved.insert(import.module.clone(), index);
        }
        Ok(resolved)
    }

    fn link(
        &mut self,
        module: &str,
        coordinate: crate::error::Coordinate,
    ) -> Result<u8, CompileError> {
        let resource = module_resource_name(module, self.ctx.extension());
        if let Some(start) = self.stack.iter().position(|(_, r)| *r == resource) {
            let mut chain: Vec<String> = self.stack[start..].iter().map(|(m, _)| m.clone()).collect();
            chain.push(module.to_string());
            return Err(CompileError::CircularImport { chain });
        }
        if let Some(index) = self.indices.get(module) {
            return Ok(*index);
        }

        let loaded = self
            .ctx
            .load_module(module)
            .map_err(|source| CompileError::Import {
                module: module.to_string(),
                coordinate,
                source,
            })?;

        let in_module = |source: CompileError| CompileError::InModule {
            module: module.to_string(),
            source: Box::new(source),
        };

        let ast = parse_module(&loaded.source).map_err(in_module)?;
        self.stack.push((module.to_string(), resource));
        let imports = self.resolve_imports(&ast);
        self.stack.pop();
        let imports = imports.map_err(|err| match err {
            // 循环导入的链条已经完整，不再包一层
            CompileError::CircularImport { .. } => err,
            other => in_module(other),
        })?;
        let chunk = compile_chunk(&ast, &imports).map_err(in_module)?;

        let index = u8::try_from(self.modules.len()).map_err(|_| CompileError::TooLarge {
            what: "module table",
            coordinate,
        })?;
        self.modules.push(ModuleChunk {
            name: module.to_string(),
            chunk,
        });
        self.indices.insert(module.to_string(), index);
        debug!(target: TARGET, module, dependency = %loaded.id, "linked module");
        Ok(index)
    }
}
