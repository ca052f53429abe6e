/// Alias of the root subquery in every compiled statement. Fixed so that
/// cached templates stay byte-stable across compilations.
pub const ROOT_ALIAS: &str = "__t_root";

/// Hands out table aliases that are unique within one compilation.
///
/// One generator instance per statement; every subquery layer takes a fresh
/// alias so deeply nested relations can never collide.
#[derive(Debug, Default)]
pub struct AliasGenerator {
    next: usize,
}

impl AliasGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> String {
        self.next += 1;
        format!("__t{}", self.next)
    }
}
