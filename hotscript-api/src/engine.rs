//! 引擎：配置 → 搜索根 → 定位器 → 编译器 → 缓存

use crate::error::EngineError;
use crate::types::PreparedScript;
use hotscript_cache::{
    module_resource_name, CacheOptions, CacheStats, ResourceLocator, ScriptCache,
    SearchPathLocator, SearchRoot,
};
use hotscript_config::{root_to_path, EngineConfig};
use hotscript_lang::{Binding, ExecuteOutput, LangCompiler, Script};
use hotscript_vfs::NativeFileSystem;
use std::sync::Arc;
use tracing::{debug, info};

const TARGET: &str = "hotscript::cache";

/// 名为 `arg` 的变量，[`Engine::run_with_arg`] 把参数绑定到它上面
pub const ARG_BINDING: &str = "arg";

/// 脚本引擎
///
/// 持有一个脚本缓存；同一个引擎可以在多个线程间共享。
pub struct Engine {
    config: EngineConfig,
    cache: ScriptCache<LangCompiler>,
}

impl Engine {
    /// 按配置创建引擎，每个搜索根是一个本地目录
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let locator = native_locator(&config);
        Self::with_locator(config, Arc::new(locator))
    }

    /// 使用自定义定位器创建引擎，配置中的 `roots` 被忽略
    pub fn with_locator(
        config: EngineConfig,
        locator: Arc<dyn ResourceLocator>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let options = CacheOptions {
            extension: config.extension.clone(),
            lock_shards: config.lock_shards,
        };
        let compiler = LangCompiler::new(config.limits.clone());
        info!(target: TARGET, roots = ?locator.describe(), "engine ready");
        Ok(Self {
            cache: ScriptCache::with_options(locator, compiler, options),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 底层脚本缓存
    pub fn cache(&self) -> &ScriptCache<LangCompiler> {
        &self.cache
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// 获取编译好的脚本，必要时（重新）编译
    pub fn compile(&self, name: &str) -> Result<Arc<Script>, EngineError> {
        Ok(self.cache.fetch(name)?)
    }

    /// 按点分模块名获取脚本：`pkg.util` → `pkg/util.hs`
    pub fn load_script_by_name(&self, module: &str) -> Result<Arc<Script>, EngineError> {
        Ok(self.cache.load_script_by_name(module)?)
    }

    /// 在给定的 Binding 上运行脚本
    pub fn run(&self, name: &str, binding: &mut Binding) -> Result<ExecuteOutput, EngineError> {
        Ok(self.cache.run(name, binding)?)
    }

    /// 把 `arg` 绑定为字符串变量运行脚本，返回结果的文本形式
    ///
    /// 脚本返回 null（或没有 return）时结果为空字符串。
    pub fn run_with_arg(&self, name: &str, arg: &str) -> Result<String, EngineError> {
        let mut binding = Binding::new().with(ARG_BINDING, arg);
        let output = self.run(name, &mut binding)?;
        debug!(target: TARGET, name, lines = output.stdout.len(), "ran with argument");
        Ok(output.value.to_text())
    }

    /// 编译脚本并配上一个空 Binding
    pub fn create(&self, name: &str) -> Result<PreparedScript, EngineError> {
        let script = self.compile(name)?;
        Ok(PreparedScript::new(name, script))
    }

    /// 脚本当前缓存的编译结果是否仍然有效
    pub fn is_fresh(&self, name: &str) -> bool {
        self.cache.is_fresh(name)
    }

    /// 丢弃脚本的缓存
    pub fn evict(&self, name: &str) -> bool {
        self.cache.evict(name)
    }

    /// 被导入模块对应的资源名
    pub fn module_resource(&self, module: &str) -> String {
        module_resource_name(module, &self.config.extension)
    }

    /// 读取脚本源码，用于错误展示
    pub fn source(&self, name: &str) -> Result<String, EngineError> {
        let mut resource = self.cache.locator().resolve(name)?;
        let source = resource.read_to_string();
        resource.release();
        Ok(source?)
    }

    /// 搜索根描述，按优先级排列
    pub fn describe_roots(&self) -> Vec<String> {
        self.cache.locator().describe()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish()
    }
}

/// 每个配置的根（目录或 `file://` URL）对应一个本地文件系统
fn native_locator(config: &EngineConfig) -> SearchPathLocator {
    let roots = config
        .roots
        .iter()
        .map(|root| {
            SearchRoot::with_base(
                root.clone(),
                Arc::new(NativeFileSystem::new()),
                root_to_path(root),
            )
        })
        .collect();
    SearchPathLocator::new(roots)
}
