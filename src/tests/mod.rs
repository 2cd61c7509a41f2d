mod support;

mod config_tests;
mod http_tests;
mod port_allocator_tests;
mod supervisor_tests;
