//! Messages and service traits of the `lenic` package, generated from
//! `proto/lenic.proto` by the build script

tonic::include_proto!("lenic");
