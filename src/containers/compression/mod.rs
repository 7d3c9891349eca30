pub mod rnc;
