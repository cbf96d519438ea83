// Tests for statements, loops, calls and scoping
use super::*;

#[test]
fn test_if_chain() {
    run(r##"
        local function classify(n)
            if n < 0 then
                return "negative"
            elseif n == 0 then
                return "zero"
            elseif n < 10 then
                return "small"
            else
                return "big"
            end
        end
        assert(classify(-5) == "negative")
        assert(classify(0) == "zero")
        assert(classify(3) == "small")
        assert(classify(100) == "big")
    "##);
}

#[test]
fn test_while_and_break() {
    run(r##"
        local i, sum = 1, 0
        while true do
            sum = sum + i
            i = i + 1
            if i > 10 then break end
        end
        assert(sum == 55)
    "##);
}

#[test]
fn test_repeat_sees_body_locals() {
    run(r##"
        local n = 0
        repeat
            local done = n >= 3
            n = n + 1
        until done
        assert(n == 4)
    "##);
}

#[test]
fn test_numeric_for() {
    run(r##"
        local sum = 0
        for i = 1, 10 do sum = sum + i end
        assert(sum == 55)

        local down = {}
        for i = 3, 1, -1 do down[#down + 1] = i end
        assert(down[1] == 3 and down[3] == 1)

        local none = 0
        for i = 1, 0 do none = none + 1 end
        assert(none == 0)

        local halves = 0
        for i = 1, 2, 0.5 do halves = halves + 1 end
        assert(halves == 3)
    "##);
    let msg = run_err("for i = 1, 10, 0 do end");
    assert!(msg.contains("'for' step is zero"));
    let msg = run_err("for i = {}, 10 do end");
    assert!(msg.contains("'for' initial value must be a number"));
}

#[test]
fn test_generic_for() {
    run(r##"
        local t = {"a", "b", "c"}
        local joined = ""
        for i, v in ipairs(t) do joined = joined .. i .. v end
        assert(joined == "1a2b3c")

        -- false is a valid control value; only nil stops the loop
        local steps = 0
        local function iter(_, i)
            steps = steps + 1
            if steps == 1 then return false end
            return nil
        end
        for v in iter do end
        assert(steps == 2)
    "##);
}

#[test]
fn test_multiple_assignment() {
    run(r##"
        local a, b, c = 1, 2
        assert(a == 1 and b == 2 and c == nil)

        a, b = b, a
        assert(a == 2 and b == 1)

        local function three() return 10, 20, 30 end
        local x, y, z = three()
        assert(x == 10 and y == 20 and z == 30)

        -- only the last call spreads
        local p, q = three(), "end"
        assert(p == 10 and q == "end")

        -- parentheses truncate to one value
        local lone = (three())
        assert(lone == 10)
    "##);
}

#[test]
fn test_member_assignment_targets() {
    run(r##"
        local t = {nested = {}}
        local u = {}
        t.nested.a, u.b = 1, 2
        assert(t.nested.a == 1 and u.b == 2)

        -- the target base is captured before the RHS runs
        local holder = {slot = {}}
        local first = holder.slot
        holder.slot.x, holder = 5, {slot = {}}
        assert(first.x == 5)
    "##);
}

#[test]
fn test_varargs() {
    run(r##"
        local function count(...)
            return select("#", ...)
        end
        assert(count() == 0)
        assert(count(1, nil, 3) == 3)

        local function head(...)
            local first = ...
            return first
        end
        assert(head(7, 8, 9) == 7)

        local function pack_tail(...)
            return {...}
        end
        local t = pack_tail("x", "y")
        assert(#t == 2 and t[1] == "x" and t[2] == "y")

        local function forward(...)
            return count(...)
        end
        assert(forward(1, 2, 3) == 3)
    "##);
}

#[test]
fn test_vararg_outside_vararg_function_rejected() {
    let mut vm = crate::LuaVm::new(crate::EnvConfig::default());
    vm.open_libs();
    let err = vm
        .compile("local function f() return ... end", "=t")
        .unwrap_err();
    assert!(err.message().contains("outside a vararg function"));
}

#[test]
fn test_closures_capture_scopes() {
    run(r##"
        local function counter()
            local n = 0
            return function()
                n = n + 1
                return n
            end
        end
        local c1 = counter()
        local c2 = counter()
        assert(c1() == 1 and c1() == 2)
        assert(c2() == 1)

        -- generic-for bodies get a fresh scope per iteration
        local fns = {}
        for _, v in ipairs({1, 2, 3}) do
            local captured = v
            fns[#fns + 1] = function() return captured end
        end
        assert(fns[1]() == 1 and fns[2]() == 2 and fns[3]() == 3)
    "##);
}

#[test]
fn test_local_function_recursion() {
    run(r##"
        local function fib(n)
            if n < 2 then return n end
            return fib(n - 1) + fib(n - 2)
        end
        assert(fib(10) == 55)
    "##);
}

#[test]
fn test_method_definitions_and_calls() {
    run(r##"
        local account = {balance = 0}
        function account:deposit(amount)
            self.balance = self.balance + amount
            return self.balance
        end
        function account.peek(a)
            return a.balance
        end
        assert(account:deposit(10) == 10)
        assert(account:deposit(5) == 15)
        assert(account.peek(account) == 15)
        assert(account:peek() == 15)
    "##);
}

#[test]
fn test_function_name_chains() {
    run(r##"
        lib = {inner = {}}
        function lib.inner.helper(x) return x * 2 end
        assert(lib.inner.helper(21) == 42)
    "##);
}

#[test]
fn test_nested_call_spread() {
    run(r##"
        local function pair() return 1, 2 end
        local function sum(a, b, c) return (a or 0) + (b or 0) + (c or 0) end
        assert(sum(pair()) == 3)
        assert(sum(0, pair()) == 3)
        assert(sum((pair())) == 1)

        local t = {pair()}
        assert(#t == 2)
        local u = {pair(), pair()}
        assert(#u == 3)
    "##);
}

#[test]
fn test_chunk_returns() {
    let values = run_values("return 1, 2, 3");
    assert_eq!(values.len(), 3);
    let values = run_values("local x = 5 return x * 2");
    assert_eq!(values[0], crate::LuaValue::Number(10.0));
}

#[test]
fn test_shadowing() {
    run(r##"
        local x = 1
        do
            local x = 2
            assert(x == 2)
        end
        assert(x == 1)

        if true then
            local x = 3
            assert(x == 3)
        end
        assert(x == 1)
    "##);
}

#[test]
fn test_break_outside_loop_rejected() {
    let mut vm = crate::LuaVm::new(crate::EnvConfig::default());
    let err = vm.compile("break", "=t").unwrap_err();
    assert!(err.message().contains("break outside a loop"));
}
