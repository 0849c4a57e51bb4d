#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod ids;
mod tag_list;

pub use ids::Tag;
pub use tag_list::TagList;
