//! 测试辅助工具
//!
//! 在内存文件系统上搭建脚本缓存。内存文件系统的修改时间是逻辑时钟，
//! 每次写入都严格递增，测试不依赖真实时间。

#![allow(dead_code)]

use hotscript_workspace::lang::{Binding, LangCompiler, Value};
use hotscript_workspace::vfs::{MemoryFileSystem, VirtualFileSystem};
use hotscript_workspace::{ScriptCache, SearchPathLocator, SearchRoot};
use std::path::Path;
use std::sync::Arc;

pub type Cache = ScriptCache<LangCompiler>;

/// 在 `/r1`, `/r2`, ... 下各建一个搜索根，全部共享同一个内存文件系统
pub fn cache_with_roots(fs: &MemoryFileSystem, roots: &[&str]) -> Cache {
    let shared: Arc<dyn VirtualFileSystem> = Arc::new(fs.clone());
    let roots = roots
        .iter()
        .map(|root| SearchRoot::with_base(*root, Arc::clone(&shared), *root))
        .collect();
    ScriptCache::new(Arc::new(SearchPathLocator::new(roots)), LangCompiler::default())
}

/// 单个搜索根 `/scripts`
pub fn cache_with_files(files: &[(&str, &str)]) -> (MemoryFileSystem, Cache) {
    let fs = MemoryFileSystem::new();
    for (path, content) in files {
        write(&fs, &format!("/scripts/{}", path), content);
    }
    let cache = cache_with_roots(&fs, &["/scripts"]);
    (fs, cache)
}

pub fn write(fs: &MemoryFileSystem, path: &str, content: &str) {
    fs.write_file(Path::new(path), content.as_bytes()).unwrap();
}

/// 运行脚本并返回结果值
pub fn run_value(cache: &Cache, name: &str) -> Value {
    cache.run(name, &mut Binding::new()).unwrap().value
}
