//! Hotscript - scripts compiled on demand and reloaded on change
//!
//! # Architecture
//!
//! ```text
//! hotscript-config  - 纯配置数据（serde）
//! hotscript-vfs     - 虚拟文件系统：内存/本地，带修改时间和显式释放的句柄
//! hotscript-cache   - 脚本缓存：定位、依赖记录、按名加锁、陈旧检查
//! hotscript-lang    - 参考脚本语言：词法、语法、字节码、虚拟机
//! hotscript-api     - 引擎门面与统一错误报告
//! hotscript-cli     - 命令行（hotscript run / check / repl）
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use hotscript_workspace::{Engine, EngineConfig};
//!
//! let engine = Engine::new(EngineConfig::with_roots(["scripts"]))?;
//! println!("{}", engine.run_with_arg("hello.hs", "world")?);
//! ```

pub use hotscript_api as api;
pub use hotscript_cache as cache;
pub use hotscript_config as config;
pub use hotscript_lang as lang;
pub use hotscript_vfs as vfs;

// 重导出常用类型
pub use hotscript_api::{Engine, EngineConfig, EngineError, ErrorReport, PreparedScript};
pub use hotscript_cache::{CacheError, ResourceLocator, ScriptCache, SearchPathLocator, SearchRoot};
pub use hotscript_lang::{Binding, LangCompiler, Value};
