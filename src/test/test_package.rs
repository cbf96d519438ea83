// Tests for require and the package searchers
use super::*;
use std::collections::HashMap;
use std::rc::Rc;

/// An environment whose module files live in an in-memory map.
fn env_with_modules(files: &[(&str, &str)]) -> crate::LuaEnv {
    let map: HashMap<String, String> = files
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let exists = Rc::new(map);
    let loads = exists.clone();
    let config = crate::EnvConfig {
        lua_path: "./?.lua;./lib/?.lua".to_string(),
        file_exists: Some(Rc::new(move |p: &str| exists.contains_key(p))),
        load_file: Some(Rc::new(move |p: &str| loads.get(p).cloned())),
        ..crate::EnvConfig::default()
    };
    crate::LuaEnv::new(config)
}

#[test]
fn test_require_via_path() {
    let mut env = env_with_modules(&[("./answer.lua", "return {value = 42}")]);
    let script = env
        .parse("local m = require(\"answer\") assert(m.value == 42) return m.value")
        .unwrap();
    let result = script.exec(&mut env).unwrap();
    assert_eq!(result, crate::LuaValue::Number(42.0));
}

#[test]
fn test_require_caches_in_loaded() {
    let mut env = env_with_modules(&[(
        "./counter.lua",
        "hits = (hits or 0) + 1 return {hits = hits}",
    )]);
    let script = env
        .parse(
            r##"
            local a = require("counter")
            local b = require("counter")
            assert(a == b)
            assert(a.hits == 1)
            assert(package.loaded.counter == a)
        "##,
        )
        .unwrap();
    script.exec(&mut env).unwrap();
}

#[test]
fn test_require_dotted_names_map_to_directories() {
    let mut env = env_with_modules(&[("./lib/util/strings.lua", "return \"loaded\"")]);
    let script = env
        .parse("assert(require(\"util.strings\") == \"loaded\")")
        .unwrap();
    script.exec(&mut env).unwrap();
}

#[test]
fn test_require_via_preload() {
    run(r##"
        package.preload.virtual = function(name)
            assert(name == "virtual")
            return {origin = "preload"}
        end
        local m = require("virtual")
        assert(m.origin == "preload")
    "##);
}

#[test]
fn test_module_returning_nothing_records_true() {
    let mut env = env_with_modules(&[("./silent.lua", "local x = 1")]);
    let script = env
        .parse("assert(require(\"silent\") == true)")
        .unwrap();
    script.exec(&mut env).unwrap();
}

#[test]
fn test_missing_module_error_lists_paths() {
    let mut env = env_with_modules(&[]);
    let script = env.parse("require(\"ghost\")").unwrap();
    let err = script.exec(&mut env).unwrap_err();
    let msg = err.message();
    assert!(msg.contains("Module 'ghost' not found!"));
    assert!(msg.contains("no field package.preload['ghost']"));
    assert!(msg.contains("no file './ghost.lua'"));
    assert!(msg.contains("no file './lib/ghost.lua'"));
}

#[test]
fn test_standard_libraries_in_loaded() {
    run(r##"
        assert(package.loaded.string == string)
        assert(package.loaded.table == table)
        assert(package.loaded.math == math)
        assert(require("string") == string)
    "##);
}

#[test]
fn test_package_path_from_config() {
    let mut env = env_with_modules(&[]);
    let script = env
        .parse("return package.path")
        .unwrap();
    let result = script.exec(&mut env).unwrap();
    assert_eq!(result, crate::LuaValue::string("./?.lua;./lib/?.lua"));
}

#[test]
fn test_require_from_real_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk_mod.lua");
    std::fs::write(&path, "return 123").unwrap();

    let config = crate::EnvConfig {
        lua_path: format!("{}/?.lua", dir.path().display()),
        ..crate::EnvConfig::default()
    };
    let mut env = crate::LuaEnv::new(config);
    let script = env
        .parse("return require(\"disk_mod\")")
        .unwrap();
    assert_eq!(
        script.exec(&mut env).unwrap(),
        crate::LuaValue::Number(123.0)
    );
}
