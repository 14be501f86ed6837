use crate::utils::backend::Backend;

pub mod create;
pub mod delete;
pub mod show;

pub trait Command: clap::Parser {
    fn execute(self, backend: &Backend) -> eyre::Result<()>;
}
