//! SQL function definitions for use with Diesel's query builder.

use diesel::sql_types::Text;

diesel::define_sql_function! {
    /// Uppercases text; search predicates fold both sides with it.
    fn upper(x: Text) -> Text;
}
