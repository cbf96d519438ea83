// Lexical scope chain
// An explicit linked list of hash maps with parent pointers: lookups walk the
// chain, local writes mutate the current node, non-local writes walk until a
// defining node is found and otherwise land in the root's global table.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::lua_value::{LuaTable, LuaValue};

pub struct Scope {
    vars: HashMap<Rc<str>, LuaValue>,
    varargs: Option<Rc<Vec<LuaValue>>>,
    parent: Option<Rc<RefCell<Scope>>>,
    /// Present on the root scope only.
    globals: Option<Rc<RefCell<LuaTable>>>,
}

impl Scope {
    /// The program-level scope (scope id 0), backed by the global table.
    pub fn root(globals: Rc<RefCell<LuaTable>>) -> Rc<RefCell<Scope>> {
        Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            varargs: None,
            parent: None,
            globals: Some(globals),
        }))
    }

    /// A child scope; new bindings shadow without mutating the parent.
    pub fn extend(parent: &Rc<RefCell<Scope>>) -> Rc<RefCell<Scope>> {
        Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            varargs: None,
            parent: Some(parent.clone()),
            globals: None,
        }))
    }

    pub fn parent(&self) -> Option<Rc<RefCell<Scope>>> {
        self.parent.clone()
    }

    /// Declare or overwrite a binding in this scope.
    pub fn set_local(&mut self, name: Rc<str>, value: LuaValue) {
        self.vars.insert(name, value);
    }

    pub fn set_varargs(&mut self, values: Vec<LuaValue>) {
        self.varargs = Some(Rc::new(values));
    }

    /// Walk the chain for a binding. `None` means the name resolves to the
    /// global table.
    pub fn lookup(scope: &Rc<RefCell<Scope>>, name: &str) -> Option<LuaValue> {
        let mut cur = scope.clone();
        loop {
            let next = {
                let s = cur.borrow();
                if let Some(v) = s.vars.get(name) {
                    return Some(v.clone());
                }
                s.parent.clone()
            };
            match next {
                Some(p) => cur = p,
                None => return None,
            }
        }
    }

    /// Assign through the chain: rewrite in the nearest defining scope.
    /// Returns the value back when no scope defines the name (the caller then
    /// writes to the globals).
    pub fn assign(scope: &Rc<RefCell<Scope>>, name: &str, value: LuaValue) -> Option<LuaValue> {
        let mut cur = scope.clone();
        loop {
            let next = {
                let mut s = cur.borrow_mut();
                if let Some(slot) = s.vars.get_mut(name) {
                    *slot = value;
                    return None;
                }
                s.parent.clone()
            };
            match next {
                Some(p) => cur = p,
                None => return Some(value),
            }
        }
    }

    /// The global table of the chain's root.
    pub fn globals(scope: &Rc<RefCell<Scope>>) -> Rc<RefCell<LuaTable>> {
        let mut cur = scope.clone();
        loop {
            let next = {
                let s = cur.borrow();
                if let Some(g) = &s.globals {
                    return g.clone();
                }
                s.parent.clone()
            };
            match next {
                Some(p) => cur = p,
                // a chain always terminates in a root scope
                None => unreachable!("scope chain without root"),
            }
        }
    }

    /// The vararg vector of the nearest enclosing scope that has one.
    pub fn varargs(scope: &Rc<RefCell<Scope>>) -> Rc<Vec<LuaValue>> {
        let mut cur = scope.clone();
        loop {
            let next = {
                let s = cur.borrow();
                if let Some(va) = &s.varargs {
                    return va.clone();
                }
                s.parent.clone()
            };
            match next {
                Some(p) => cur = p,
                None => return Rc::new(Vec::new()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_with_globals() -> Rc<RefCell<Scope>> {
        Scope::root(Rc::new(RefCell::new(LuaTable::new())))
    }

    #[test]
    fn shadowing_does_not_mutate_parent() {
        let root = root_with_globals();
        let outer = Scope::extend(&root);
        outer
            .borrow_mut()
            .set_local(Rc::from("x"), LuaValue::Number(1.0));
        let inner = Scope::extend(&outer);
        inner
            .borrow_mut()
            .set_local(Rc::from("x"), LuaValue::Number(2.0));

        assert_eq!(Scope::lookup(&inner, "x"), Some(LuaValue::Number(2.0)));
        assert_eq!(Scope::lookup(&outer, "x"), Some(LuaValue::Number(1.0)));
    }

    #[test]
    fn assign_rewrites_nearest_defining_scope() {
        let root = root_with_globals();
        let outer = Scope::extend(&root);
        outer
            .borrow_mut()
            .set_local(Rc::from("x"), LuaValue::Number(1.0));
        let inner = Scope::extend(&outer);

        assert!(Scope::assign(&inner, "x", LuaValue::Number(5.0)).is_none());
        assert_eq!(Scope::lookup(&outer, "x"), Some(LuaValue::Number(5.0)));

        // undefined name falls through to the root
        assert!(Scope::assign(&inner, "y", LuaValue::Number(7.0)).is_some());
    }

    #[test]
    fn varargs_found_through_block_scopes() {
        let root = root_with_globals();
        let func = Scope::extend(&root);
        func.borrow_mut().set_varargs(vec![LuaValue::Number(9.0)]);
        let block = Scope::extend(&func);
        assert_eq!(Scope::varargs(&block)[0], LuaValue::Number(9.0));
    }
}
