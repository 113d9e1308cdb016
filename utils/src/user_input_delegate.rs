use std::{fmt::Display, io};

/// Produces completion candidates for a partially typed path.
pub type PathCompleter<'a> = &'a dyn Fn(&str) -> Vec<String>;

/// Everything the update engine needs to ask the user.
pub trait UserInputDelegate {
    /// The list provided is guaranteed to always have at least one element.
    ///
    /// Returns the index of the picked item.
    fn select_item_from_list<T: Display>(
        &mut self,
        message: &str,
        items: &[T],
    ) -> io::Result<usize>;

    /// Free text path input. `default` is used when the user enters nothing and
    /// `complete` can be used to offer directory names matching what was typed.
    fn get_path_input(
        &mut self,
        message: &str,
        default: Option<&str>,
        complete: PathCompleter<'_>,
    ) -> io::Result<String>;
}
