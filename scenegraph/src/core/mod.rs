//! Core scene data: entities, hierarchy links and transforms

pub mod entity;
