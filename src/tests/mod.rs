/*!
Scenario coverage for the alias engine: whole queries against small
hand-built functions, exercising the paths that unit tests in the
individual modules do not reach on their own.
*/

#![allow(unused_imports)]
#![allow(unused_variables)]
#![allow(unused_must_use)]

mod alias_query_tests;
