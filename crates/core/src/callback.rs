use std::rc::Rc;

/// A shared, single-threaded callback. Identity is the allocation.
pub type Callback<A> = Rc<dyn Fn(A)>;

/// Whether two callbacks are the same allocation.
///
/// Compares data pointers only; vtable pointers for the same closure type
/// may differ across codegen units.
pub fn same_callback<A>(a: &Callback<A>, b: &Callback<A>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// Address used as the callback's identity in cache keys.
pub fn callback_id<A>(cb: &Callback<A>) -> usize {
    Rc::as_ptr(cb).cast::<()>() as usize
}

/// Memoized forwarding wrapper around a host-supplied setter, so cached
/// rows keyed on the callback survive hosts that rebuild closures per frame.
///
/// `get` rebuilds the wrapper only when the setter's identity changes.
pub struct StableCallback<A> {
    cached: Option<(Callback<A>, Callback<A>)>,
}

impl<A: 'static> StableCallback<A> {
    pub fn new() -> Self {
        Self { cached: None }
    }

    /// The wrapper for `setter`. Returns the previous wrapper when `setter`
    /// is the same allocation as last time.
    pub fn get(&mut self, setter: &Callback<A>) -> Callback<A> {
        if let Some((dep, wrapper)) = &self.cached
            && same_callback(dep, setter)
        {
            return Rc::clone(wrapper);
        }

        let target = Rc::clone(setter);
        let wrapper: Callback<A> = Rc::new(move |arg: A| target(arg));
        tracing::trace!("rebuilding stable callback wrapper");
        self.cached = Some((Rc::clone(setter), Rc::clone(&wrapper)));
        wrapper
    }

    /// The current wrapper, if `get` has been called.
    pub fn current(&self) -> Option<&Callback<A>> {
        self.cached.as_ref().map(|(_, wrapper)| wrapper)
    }
}

impl<A: 'static> Default for StableCallback<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn same_setter_same_wrapper() {
        let setter: Callback<u32> = Rc::new(|_: u32| {});
        let mut stable = StableCallback::new();
        let first = stable.get(&setter);
        let second = stable.get(&Rc::clone(&setter));
        assert!(same_callback(&first, &second));
        assert_eq!(callback_id(&first), callback_id(&second));
    }

    #[test]
    fn new_setter_new_wrapper() {
        let mut stable = StableCallback::new();
        let a: Callback<u32> = Rc::new(|_: u32| {});
        let b: Callback<u32> = Rc::new(|_: u32| {});
        let first = stable.get(&a);
        let second = stable.get(&b);
        assert!(!same_callback(&first, &second));
        // Going back to `a` rebuilds again; only the last dependency is kept.
        let third = stable.get(&a);
        assert!(!same_callback(&first, &third));
    }

    #[test]
    fn wrapper_forwards_to_current_setter() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut stable = StableCallback::new();

        let log_a = Rc::clone(&seen);
        let a: Callback<&'static str> =
            Rc::new(move |s: &'static str| log_a.borrow_mut().push(("a", s)));
        stable.get(&a)("one");

        let log_b = Rc::clone(&seen);
        let b: Callback<&'static str> =
            Rc::new(move |s: &'static str| log_b.borrow_mut().push(("b", s)));
        stable.get(&b)("two");

        assert_eq!(*seen.borrow(), vec![("a", "one"), ("b", "two")]);
        assert!(stable.current().is_some());
    }
}
