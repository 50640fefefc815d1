mod ipc_tests;
