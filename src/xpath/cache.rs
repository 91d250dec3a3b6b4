//! Thread-local cache of compiled XPath expressions.
//!
//! The same XPath is typically resolved once per edit directive, and scripts
//! often repeat a handful of paths. Capped at 256 entries; when full the
//! cache is cleared and refilled on demand.

use crate::xpath::errors::XPathError;
use crate::xpath::parser::{parse, Expr};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

const MAX_CACHE_ENTRIES: usize = 256;

thread_local! {
    static EXPR_CACHE: RefCell<HashMap<String, Rc<Expr>>> = RefCell::new(HashMap::new());
}

/// Get a compiled expression from cache, or compile and cache it.
///
/// Compilation failures are not cached.
pub fn get_or_compile(xpath: &str) -> Result<Rc<Expr>, XPathError> {
    EXPR_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();

        if let Some(expr) = cache.get(xpath) {
            return Ok(Rc::clone(expr));
        }

        if cache.len() >= MAX_CACHE_ENTRIES {
            cache.clear();
        }

        let compiled = Rc::new(parse(xpath)?);
        cache.insert(xpath.to_string(), Rc::clone(&compiled));
        Ok(compiled)
    })
}

pub fn clear_cache() {
    EXPR_CACHE.with(|cache| cache.borrow_mut().clear());
}

pub fn cache_size() -> usize {
    EXPR_CACHE.with(|cache| cache.borrow().len())
}
