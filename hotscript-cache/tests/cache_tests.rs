//! ScriptCache 端到端测试
//!
//! 使用一个按行工作的测试编译器：`include <name>` 行通过 CompileContext
//! 加载依赖，`fail` 行使编译失败，其余行原样拼接到输出中。

use hotscript_cache::{
    BoxError, CacheError, CompileContext, Compiler, Executable, ResourceError, ScriptCache,
    SearchPathLocator, SearchRoot,
};
use hotscript_vfs::{Fault, MemoryFileSystem, VirtualFileSystem};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug)]
struct Text(String);

impl Executable for Text {
    type Bindings = Vec<String>;
    type Output = String;

    fn execute(&self, bindings: &mut Vec<String>) -> Result<String, BoxError> {
        if self.0.contains("boom") {
            return Err("exploded at runtime".into());
        }
        bindings.push(self.0.clone());
        Ok(format!("{}:{}", bindings.len(), self.0))
    }
}

#[derive(Default)]
struct LineCompiler {
    compilations: Arc<AtomicUsize>,
    reject_all: Arc<AtomicBool>,
}

impl Compiler for LineCompiler {
    type Unit = Text;

    fn compile(&self, ctx: &mut CompileContext<'_>, source: &str) -> Result<Text, BoxError> {
        self.compilations.fetch_add(1, Ordering::SeqCst);
        if self.reject_all.load(Ordering::SeqCst) {
            return Err(format!("rejected {}", ctx.script_name()).into());
        }

        let mut parts = Vec::new();
        for line in source.lines() {
            if let Some(dep) = line.strip_prefix("include ") {
                let loaded = ctx.load_dependency(dep.trim())?;
                parts.push(loaded.source.trim().to_string());
            } else if line.trim() == "fail" {
                return Err("syntax error".into());
            } else {
                parts.push(line.trim().to_string());
            }
        }
        Ok(Text(parts.join("+")))
    }
}

fn setup(files: &[(&str, &str)]) -> (MemoryFileSystem, ScriptCache<LineCompiler>, Arc<AtomicUsize>) {
    let fs = MemoryFileSystem::with_files(
        files
            .iter()
            .map(|(path, content)| (path.to_string(), content.as_bytes().to_vec())),
    );
    let locator = SearchPathLocator::new(vec![SearchRoot::with_base(
        "mem",
        Arc::new(fs.clone()) as Arc<dyn VirtualFileSystem>,
        "/",
    )]);
    let compiler = LineCompiler::default();
    let count = Arc::clone(&compiler.compilations);
    (fs, ScriptCache::new(Arc::new(locator), compiler), count)
}

fn assert_no_open_handles(fs: &MemoryFileSystem) {
    assert_eq!(fs.open_handles(), 0, "handles still open");
    assert_eq!(fs.leaked_handles(), 0, "handles dropped without close");
}

// ==================== 复用 ====================

#[test]
fn test_second_fetch_reuses_unit() {
    let (fs, cache, count) = setup(&[("/a.hs", "alpha")]);

    let first = cache.fetch("a.hs").unwrap();
    let second = cache.fetch("a.hs").unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(cache.stats().hits, 1);
    assert_eq!(cache.stats().compilations, 1);
    assert!(cache.is_fresh("a.hs"));
    assert_no_open_handles(&fs);
}

#[test]
fn test_primary_change_recompiles() {
    let (fs, cache, count) = setup(&[("/a.hs", "alpha")]);

    let first = cache.fetch("a.hs").unwrap();
    fs.write_file(Path::new("/a.hs"), b"beta").unwrap();
    let second = cache.fetch("a.hs").unwrap();

    assert_eq!(first.0, "alpha");
    assert_eq!(second.0, "beta");
    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert_no_open_handles(&fs);
}

#[test]
fn test_unit_outlives_replacement() {
    let (fs, cache, _count) = setup(&[("/a.hs", "alpha")]);

    let held = cache.fetch("a.hs").unwrap();
    fs.touch(Path::new("/a.hs")).unwrap();
    let replaced = cache.fetch("a.hs").unwrap();

    assert!(!Arc::ptr_eq(&held, &replaced));
    assert_eq!(held.0, "alpha");
}

// ==================== 依赖 ====================

#[test]
fn test_dependency_change_recompiles() {
    let (fs, cache, count) = setup(&[("/main.hs", "include lib.hs\nmain"), ("/lib.hs", "v1")]);

    assert_eq!(cache.fetch("main.hs").unwrap().0, "v1+main");
    let entry = cache.entry("main.hs").unwrap();
    assert_eq!(entry.dependencies().len(), 1);

    // 依赖未变化时不重新编译
    cache.fetch("main.hs").unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);

    fs.write_file(Path::new("/lib.hs"), b"v2").unwrap();
    assert!(!cache.is_fresh("main.hs"));
    assert_eq!(cache.fetch("main.hs").unwrap().0, "v2+main");
    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert_no_open_handles(&fs);
}

#[test]
fn test_dependencies_are_flat() {
    let (_fs, cache, _count) = setup(&[
        ("/main.hs", "include mid.hs"),
        ("/mid.hs", "include leaf.hs"),
        ("/leaf.hs", "leaf"),
    ]);

    // 测试编译器只展开一层：mid.hs 的内容被原样读取
    assert_eq!(cache.fetch("main.hs").unwrap().0, "include leaf.hs");
    let entry = cache.entry("main.hs").unwrap();
    let paths: Vec<_> = entry.dependencies().keys().map(|id| id.path().to_path_buf()).collect();
    assert_eq!(paths, vec![Path::new("/mid.hs").to_path_buf()]);
}

#[test]
fn test_vanished_dependency_forces_recompile() {
    let (fs, cache, count) = setup(&[("/main.hs", "include lib.hs"), ("/lib.hs", "v1")]);
    cache.fetch("main.hs").unwrap();

    fs.remove_file(Path::new("/lib.hs")).unwrap();
    let err = cache.fetch("main.hs").unwrap_err();

    assert!(err.is_compile());
    assert!(err.cause::<ResourceError>().is_some());
    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert_no_open_handles(&fs);
}

#[test]
fn test_dependency_probe_fault_is_stale() {
    let (fs, cache, count) = setup(&[("/main.hs", "include lib.hs"), ("/lib.hs", "v1")]);
    cache.fetch("main.hs").unwrap();

    fs.inject_fault(Path::new("/lib.hs"), Fault::Metadata);
    assert!(!cache.is_fresh("main.hs"));
    assert_no_open_handles(&fs);

    fs.clear_faults();
    cache.fetch("main.hs").unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

// ==================== 搜索路径 ====================

#[test]
fn test_later_root_serves_missing_name() {
    let fs = MemoryFileSystem::with_files([("/r2/x.hs", b"from r2".to_vec())]);
    let shared: Arc<dyn VirtualFileSystem> = Arc::new(fs.clone());
    let locator = SearchPathLocator::new(vec![
        SearchRoot::with_base("r1", Arc::clone(&shared), "/r1"),
        SearchRoot::with_base("r2", shared, "/r2"),
    ]);
    let cache = ScriptCache::new(Arc::new(locator), LineCompiler::default());

    assert_eq!(cache.fetch("x.hs").unwrap().0, "from r2");
    assert_eq!(cache.entry("x.hs").unwrap().resource().root(), 1);

    // 更高优先级的根出现同名脚本时重新解析
    fs.write_file(Path::new("/r1/x.hs"), b"from r1").unwrap();
    assert_eq!(cache.fetch("x.hs").unwrap().0, "from r1");
    assert_no_open_handles(&fs);
}

#[test]
fn test_missing_script_is_unavailable() {
    let (fs, cache, count) = setup(&[]);

    let err = cache.fetch("nope.hs").unwrap_err();
    assert!(err.is_resource_unavailable());
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert!(cache.is_empty());
    assert_eq!(cache.stats().failures, 1);
    assert_no_open_handles(&fs);
}

#[test]
fn test_load_script_by_name() {
    let (_fs, cache, _count) = setup(&[("/pkg/util.hs", "util")]);
    assert_eq!(cache.load_script_by_name("pkg.util").unwrap().0, "util");
    assert_eq!(cache.names(), vec!["pkg/util.hs".to_string()]);
}

// ==================== 失败隔离 ====================

#[test]
fn test_failed_recompile_keeps_previous_entry() {
    let (fs, cache, count) = setup(&[("/w.hs", "good")]);
    let reject = Arc::clone(&cache.compiler().reject_all);

    let original = cache.fetch("w.hs").unwrap();
    fs.touch(Path::new("/w.hs")).unwrap();
    reject.store(true, Ordering::SeqCst);

    let err = cache.fetch("w.hs").unwrap_err();
    match &err {
        CacheError::Compile { name, .. } => assert_eq!(name, "w.hs"),
        other => panic!("expected compile error, got {:?}", other),
    }
    let kept = cache.entry("w.hs").unwrap();
    assert!(Arc::ptr_eq(kept.unit(), &original));

    // 下一次请求从头重试
    reject.store(false, Ordering::SeqCst);
    assert_eq!(cache.fetch("w.hs").unwrap().0, "good");
    assert_eq!(count.load(Ordering::SeqCst), 3);
    assert_no_open_handles(&fs);
}

#[test]
fn test_cold_compile_failure_publishes_nothing() {
    let (fs, cache, _count) = setup(&[("/bad.hs", "fail")]);
    assert!(cache.fetch("bad.hs").unwrap_err().is_compile());
    assert!(cache.entry("bad.hs").is_none());
    assert_no_open_handles(&fs);
}

#[test]
fn test_unavailable_primary_keeps_entry() {
    let (fs, cache, _count) = setup(&[("/a.hs", "alpha")]);
    cache.fetch("a.hs").unwrap();

    fs.remove_file(Path::new("/a.hs")).unwrap();
    assert!(cache.fetch("a.hs").unwrap_err().is_resource_unavailable());
    assert!(cache.entry("a.hs").is_some());
}

#[test]
fn test_read_failure_is_unavailable() {
    let (fs, cache, _count) = setup(&[("/a.hs", "alpha")]);
    fs.inject_fault(Path::new("/a.hs"), Fault::Read);

    let err = cache.fetch("a.hs").unwrap_err();
    assert!(matches!(
        err,
        CacheError::ResourceUnavailable(ResourceError::Read { .. })
    ));
    assert_no_open_handles(&fs);
}

#[test]
fn test_invalid_utf8_is_unavailable() {
    let fs = MemoryFileSystem::with_files([("/bin.hs", vec![0xc3, 0x28])]);
    let locator = SearchPathLocator::new(vec![SearchRoot::with_base("mem", Arc::new(fs), "/")]);
    let cache = ScriptCache::new(Arc::new(locator), LineCompiler::default());

    assert!(matches!(
        cache.fetch("bin.hs").unwrap_err(),
        CacheError::ResourceUnavailable(ResourceError::Decode { .. })
    ));
}

// ==================== 资源释放 ====================

#[test]
fn test_close_failure_does_not_mask_success() {
    let (fs, cache, _count) = setup(&[("/main.hs", "include lib.hs"), ("/lib.hs", "lib")]);
    fs.inject_fault(Path::new("/main.hs"), Fault::Close);
    fs.inject_fault(Path::new("/lib.hs"), Fault::Close);

    assert_eq!(cache.fetch("main.hs").unwrap().0, "lib");
    assert_eq!(cache.fetch("main.hs").unwrap().0, "lib");
    assert_no_open_handles(&fs);
}

#[test]
fn test_every_path_releases_handles() {
    let (fs, cache, _count) = setup(&[
        ("/ok.hs", "include dep.hs"),
        ("/dep.hs", "dep"),
        ("/bad.hs", "include dep.hs\nfail"),
    ]);

    cache.fetch("ok.hs").unwrap();
    cache.fetch("ok.hs").unwrap();
    let _ = cache.fetch("bad.hs");
    let _ = cache.fetch("missing.hs");
    fs.inject_fault(Path::new("/dep.hs"), Fault::Metadata);
    let _ = cache.fetch("ok.hs");

    assert!(fs.opened_handles() > 0);
    assert_no_open_handles(&fs);
}

// ==================== run ====================

#[test]
fn test_run_executes_with_bindings() {
    let (_fs, cache, _count) = setup(&[("/a.hs", "alpha"), ("/boom.hs", "boom")]);
    let mut bindings = vec!["seed".to_string()];

    assert_eq!(cache.run("a.hs", &mut bindings).unwrap(), "2:alpha");
    assert_eq!(bindings.len(), 2);

    let err = cache.run("boom.hs", &mut bindings).unwrap_err();
    assert!(err.is_execution());
    assert!(err.to_string().contains("boom.hs"));
}

#[test]
fn test_evict_and_clear() {
    let (_fs, cache, count) = setup(&[("/a.hs", "a"), ("/b.hs", "b")]);
    cache.fetch("a.hs").unwrap();
    cache.fetch("b.hs").unwrap();
    assert_eq!(cache.len(), 2);

    assert!(cache.evict("a.hs"));
    assert!(!cache.evict("a.hs"));
    cache.fetch("a.hs").unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 3);

    cache.clear();
    assert!(cache.is_empty());
}

// ==================== 并发 ====================

#[test]
fn test_concurrent_cold_fetch_compiles_once() {
    let (fs, cache, count) = setup(&[("/hot.hs", "hot")]);
    let cache = Arc::new(cache);
    let callers = 8;
    let barrier = Arc::new(Barrier::new(callers));

    let handles: Vec<_> = (0..callers)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.fetch("hot.hs").unwrap()
            })
        })
        .collect();
    let units: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(units.iter().all(|u| Arc::ptr_eq(u, &units[0])));
    assert_eq!(cache.active_locks(), 0);
    assert_no_open_handles(&fs);
}

/// 在编译 `slow.hs` 时阻塞，直到收到放行信号
struct GateCompiler {
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl Compiler for GateCompiler {
    type Unit = Text;

    fn compile(&self, ctx: &mut CompileContext<'_>, source: &str) -> Result<Text, BoxError> {
        if ctx.script_name() == "slow.hs" {
            let _ = self.entered.lock().unwrap().send(());
            self.release
                .lock()
                .unwrap()
                .recv_timeout(Duration::from_secs(10))?;
        }
        Ok(Text(source.to_string()))
    }
}

#[test]
fn test_distinct_names_do_not_block_each_other() {
    let fs = MemoryFileSystem::with_files([
        ("/slow.hs", b"slow".to_vec()),
        ("/fast.hs", b"fast".to_vec()),
    ]);
    let locator = SearchPathLocator::new(vec![SearchRoot::with_base("mem", Arc::new(fs), "/")]);
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let cache = Arc::new(ScriptCache::new(
        Arc::new(locator),
        GateCompiler {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        },
    ));

    let slow = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || cache.fetch("slow.hs").map(|u| u.0.clone()))
    };
    entered_rx.recv_timeout(Duration::from_secs(10)).unwrap();

    // slow.hs 仍在编译中，fast.hs 必须能够完成
    assert_eq!(cache.fetch("fast.hs").unwrap().0, "fast");

    release_tx.send(()).unwrap();
    assert_eq!(slow.join().unwrap().unwrap(), "slow");
}
