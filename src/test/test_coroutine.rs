// Tests for the coroutine scheduler
use super::*;

#[test]
fn test_yield_resume_round_trip() {
    // spec scenario: values flow both ways across the yield boundary
    run(r##"
        local co = coroutine.create(function(a)
            local b = coroutine.yield(a + 1)
            return a + b
        end)
        local r1 = {coroutine.resume(co, 3)}
        local r2 = {coroutine.resume(co, 5)}
        assert(r1[1] == true and r1[2] == 4)
        assert(r2[1] == true and r2[2] == 8)
    "##);
}

#[test]
fn test_status_transitions() {
    run(r##"
        local co
        co = coroutine.create(function()
            assert(coroutine.status(co) == "running")
            coroutine.yield()
        end)
        assert(coroutine.status(co) == "suspended")
        assert(coroutine.resume(co))
        assert(coroutine.status(co) == "suspended")
        assert(coroutine.resume(co))
        assert(coroutine.status(co) == "dead")
    "##);
}

#[test]
fn test_resume_dead_raises() {
    run(r##"
        local co = coroutine.create(function() return 1 end)
        assert(coroutine.resume(co))
        local ok, err = pcall(coroutine.resume, co)
        assert(ok == false)
        assert(err == "cannot resume dead coroutine")
    "##);
}

#[test]
fn test_body_error_reported_by_resume() {
    run(r##"
        local co = coroutine.create(function() error("inside") end)
        local ok, msg = coroutine.resume(co)
        assert(ok == false)
        assert(msg == "inside")
        assert(coroutine.status(co) == "dead")
    "##);
}

#[test]
fn test_multiple_yield_values() {
    run(r##"
        local co = coroutine.create(function()
            local a, b = coroutine.yield(1, 2, 3)
            return a * b
        end)
        local ok, x, y, z = coroutine.resume(co)
        assert(ok and x == 1 and y == 2 and z == 3)
        local ok2, product = coroutine.resume(co, 6, 7)
        assert(ok2 and product == 42)
    "##);
}

#[test]
fn test_yield_from_nested_lua_call() {
    run(r##"
        local function inner()
            coroutine.yield("deep")
        end
        local co = coroutine.create(function()
            inner()
            return "done"
        end)
        local ok, v = coroutine.resume(co)
        assert(ok and v == "deep")
        local ok2, v2 = coroutine.resume(co)
        assert(ok2 and v2 == "done")
    "##);
}

#[test]
fn test_wrap() {
    run(r##"
        local gen = coroutine.wrap(function(first)
            local next_value = coroutine.yield(first * 2)
            coroutine.yield(next_value * 2)
            return "finished"
        end)
        assert(gen(10) == 20)
        assert(gen(21) == 42)
        assert(gen() == "finished")
    "##);
}

#[test]
fn test_wrap_rethrows() {
    run(r##"
        local f = coroutine.wrap(function() error("wrapped failure") end)
        local ok, err = pcall(f)
        assert(ok == false)
        assert(err == "wrapped failure")
    "##);
}

#[test]
fn test_running() {
    run(r##"
        local main, is_main = coroutine.running()
        assert(type(main) == "thread")
        assert(is_main == true)

        local co = coroutine.create(function()
            local me, inside_main = coroutine.running()
            return me, inside_main
        end)
        local ok, me, inside_main = coroutine.resume(co)
        assert(ok and me == co and inside_main == false)
    "##);
}

#[test]
fn test_isyieldable() {
    run(r##"
        assert(coroutine.isyieldable() == false)
        local co = coroutine.create(function()
            return coroutine.isyieldable()
        end)
        local ok, inside = coroutine.resume(co)
        assert(ok and inside == true)
    "##);
}

#[test]
fn test_yield_outside_coroutine_raises() {
    let msg = run_err("coroutine.yield(1)");
    assert!(msg.contains("attempt to yield from outside a coroutine"));
}

#[test]
fn test_generator_pattern() {
    run(r##"
        local function range(n)
            return coroutine.wrap(function()
                for i = 1, n do
                    coroutine.yield(i)
                end
            end)
        end
        local sum = 0
        for v in range(5) do
            sum = sum + v
        end
        assert(sum == 15)
    "##);
}

#[test]
fn test_interleaved_coroutines() {
    run(r##"
        local function make(tag)
            return coroutine.create(function()
                for i = 1, 2 do
                    coroutine.yield(tag .. i)
                end
            end)
        end
        local a = make("a")
        local b = make("b")
        local log = {}
        local _, v = coroutine.resume(a); log[#log + 1] = v
        local _, v = coroutine.resume(b); log[#log + 1] = v
        local _, v = coroutine.resume(a); log[#log + 1] = v
        local _, v = coroutine.resume(b); log[#log + 1] = v
        assert(table.concat(log, ",") == "a1,b1,a2,b2")
    "##);
}

#[test]
fn test_call_on_thread_resumes() {
    // call dispatch treats a thread as resume
    run(r##"
        local co = coroutine.create(function(x) return x + 1 end)
        local ok, v = co(41)
        assert(ok == true and v == 42)
    "##);
}
