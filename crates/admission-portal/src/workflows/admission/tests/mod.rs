mod common;
mod drafts;
