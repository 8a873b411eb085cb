tonic::include_proto!("emotion");

pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("emotion");
