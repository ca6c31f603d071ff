pub(crate) mod dao_impl;
pub(crate) mod dao_trait;

#[cfg(test)]
pub(crate) mod mock;

pub(crate) use dao_impl::FeedsynthDaoImpl;
pub(crate) use dao_trait::FeedsynthDao;
