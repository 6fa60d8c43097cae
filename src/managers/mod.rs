// Chat bookmark state managers
// Managers own mutable state: the active chat's working list and the index that mirrors it.

pub mod bookmark_store;
