pub(crate) mod block_timestamp;
pub(crate) mod dao;
pub(crate) mod governance;
pub(crate) mod guard;
pub(crate) mod proposal;
pub(crate) mod roles;
pub(crate) mod safe;
pub(crate) mod treasury;
