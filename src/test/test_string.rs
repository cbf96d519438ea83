// Tests for the string library
use super::*;

#[test]
fn test_len_sub() {
    run(r##"
        assert(string.len("hello") == 5)
        assert(string.sub("hello", 2, 4) == "ell")
        assert(string.sub("hello", 2) == "ello")
        assert(string.sub("hello", -3) == "llo")
        assert(string.sub("hello", -3, -2) == "ll")
        assert(string.sub("hello", 3, 100) == "llo")
        assert(string.sub("hello", 4, 2) == "")
        assert(string.sub("hello", 0) == "hello")
    "##);
}

#[test]
fn test_sub_length_agrees_with_clamp() {
    // #s:sub(i, j) == max(0, min(j, #s) - max(i, 1) + 1) for positive i, j
    run(r##"
        local s = "abcdefgh"
        for i = 1, #s + 2 do
            for j = 0, #s + 2 do
                local expect = math.max(0, math.min(j, #s) - math.max(i, 1) + 1)
                assert(#string.sub(s, i, j) == expect)
            end
        end
    "##);
}

#[test]
fn test_case_rep_reverse() {
    run(r##"
        assert(string.upper("mixed Case 1") == "MIXED CASE 1")
        assert(string.lower("MIXED Case 1") == "mixed case 1")
        assert(string.rep("ab", 3) == "ababab")
        assert(string.rep("x", 0) == "")
        assert(string.rep("a", 3, "-") == "a-a-a")
        assert(string.reverse("abc") == "cba")
    "##);
}

#[test]
fn test_byte_char() {
    run(r##"
        assert(string.byte("A") == 65)
        local a, b = string.byte("AB", 1, 2)
        assert(a == 65 and b == 66)
        assert(string.byte("hello", -1) == 111)
        assert(string.char(104, 105) == "hi")
        assert(string.char() == "")
    "##);
}

#[test]
fn test_format_integers() {
    run(r##"
        assert(string.format("%d", 42) == "42")
        assert(string.format("%i", -7) == "-7")
        assert(string.format("%5d", 42) == "   42")
        assert(string.format("%-5d|", 42) == "42   |")
        assert(string.format("%05d", 42) == "00042")
        assert(string.format("%+d", 42) == "+42")
        assert(string.format("%x", 255) == "ff")
        assert(string.format("%X", 255) == "FF")
        assert(string.format("%#x", 255) == "0xff")
        assert(string.format("%o", 8) == "10")
        assert(string.format("%c", 65) == "A")
    "##);
}

#[test]
fn test_format_floats_and_strings() {
    run(r##"
        assert(string.format("%.2f", 3.14159) == "3.14")
        assert(string.format("%.0f", 2.5) == "2")
        assert(string.format("%e", 150.0) == "1.500000e+02")
        assert(string.format("%g", 100.0) == "100")
        assert(string.format("%g", 0.5) == "0.5")
        assert(string.format("%s", "text") == "text")
        assert(string.format("%10s|", "ab") == "        ab|")
        assert(string.format("%-10s|", "ab") == "ab        |")
        assert(string.format("%.2s", "abcdef") == "ab")
        assert(string.format("%%") == "%")
        assert(string.format("%s and %d", "x", 2) == "x and 2")
    "##);
}

#[test]
fn test_format_q() {
    run(r##"
        assert(string.format("%q", 'say "hi"') == '"say \\"hi\\""')
        assert(string.format("%q", "line1\nline2") == '"line1\\nline2"')
    "##);
}

#[test]
fn test_format_errors() {
    let msg = run_err("return string.format(\"%d\", \"abc\")");
    assert!(msg.contains("bad argument"));
    let msg = run_err("return string.format(\"%d\", 1.5)");
    assert!(msg.contains("no integer representation"));
}

#[test]
fn test_find_plain() {
    run(r##"
        -- plain find ignores magic characters
        local s, e = string.find("a.b.c", ".b", 1, true)
        assert(s == 2 and e == 3)
        assert(string.find("abc", "%a", 1, true) == nil)
        local s2 = string.find("abcabc", "bc", 4, true)
        assert(s2 == 5)
    "##);
}

#[test]
fn test_find_patterns() {
    run(r##"
        local s, e = string.find("hello world", "o w")
        assert(s == 5 and e == 7)
        local s, e, cap = string.find("key=value", "(%a+)=")
        assert(s == 1 and e == 4 and cap == "key")
        assert(string.find("abc", "^b") == nil)
        assert(string.find("abc", "^a") == 1)
        assert(string.find("abc", "c$") == 3)
        assert(string.find("abc", "z") == nil)
    "##);
}

#[test]
fn test_match() {
    run(r##"
        assert(string.match("hello 42 world", "%d+") == "42")
        local k, v = string.match("name=lua", "(%a+)=(%a+)")
        assert(k == "name" and v == "lua")
        assert(string.match("abc", "%d") == nil)
        local pos = string.match("xyz", "()y")
        assert(pos == 2)
    "##);
}

#[test]
fn test_gmatch_streams() {
    run(r##"
        local words = {}
        for w in string.gmatch("one two three", "%a+") do
            words[#words + 1] = w
        end
        assert(#words == 3)
        assert(words[1] == "one" and words[3] == "three")

        local pairs_found = {}
        for k, v in string.gmatch("a=1,b=2", "(%a+)=(%d+)") do
            pairs_found[k] = v
        end
        assert(pairs_found.a == "1" and pairs_found.b == "2")

        -- the iterator is lazy: it can be abandoned mid-way
        local iter = string.gmatch("x y z", "%a")
        assert(iter() == "x")
        assert(iter() == "y")
    "##);
}

#[test]
fn test_gsub() {
    // spec scenario: word replacement with a count
    run(r##"
        local out, n = string.gsub("hello world", "%w+", "X")
        assert(out == "X X" and n == 2)

        local capped = string.gsub("abc", "%a", "%0%0")
        assert(capped == "aabbcc")

        local swapped = string.gsub("a=1", "(%a)=(%d)", "%2=%1")
        assert(swapped == "1=a")

        local limited = string.gsub("aaa", "a", "b", 2)
        assert(limited == "bba")

        local via_table = string.gsub("x y", "%a", {x = "1", y = "2"})
        assert(via_table == "1 2")

        local via_fn = string.gsub("abc", "%a", function(c)
            return c:upper()
        end)
        assert(via_fn == "ABC")

        -- nil replacements keep the original text
        local kept = string.gsub("abc", "%a", function() return nil end)
        assert(kept == "abc")
    "##);
}

#[test]
fn test_gsub_anchored() {
    run(r##"
        local out, n = string.gsub("aaa", "^a", "b")
        assert(out == "baa" and n == 1)
    "##);
}

#[test]
fn test_pattern_classes() {
    run(r##"
        assert(string.match("foo_bar2", "[%a_][%w_]*") == "foo_bar2")
        assert(string.match("  lead", "^%s+") == "  ")
        assert(string.match("0x1F", "%x+") == "0")
        assert(string.match("hi!", "%p") == "!")
        assert(string.match("ABC", "%u+") == "ABC")
        assert(string.match("abc", "%l+") == "abc")
        assert(string.match("a1", "%A") == "1")
    "##);
}

#[test]
fn test_unsupported_pattern_forms() {
    let msg = run_err("return string.match(\"(x)\", \"%b()\")");
    assert!(msg.contains("malformed pattern"));
    let msg = run_err("return string.match(\"x\", \"%f[%a]\")");
    assert!(msg.contains("malformed pattern"));
}

#[test]
fn test_string_methods_via_metatable() {
    run(r##"
        local s = "one,two"
        assert(s:find(",") == 4)
        assert(s:match("^%a+") == "one")
        assert(s:gsub(",", ";") == "one;two")
    "##);
}
