//! Reference networks in the plain JSON layout read by [`Network::from_json_str`].
//!
//! [`Network::from_json_str`]: crate::io::pandapower::Network::from_json_str

/// 110 kV feeder of 50 km with an unbalanced load at the far end.
pub const TWO_BUS_110KV: &str = r#"{
    "sn_mva": 100.0,
    "bus": [
        {"index": 1, "vn_kv": 110.0},
        {"index": 5, "vn_kv": 110.0}
    ],
    "ext_grid": [
        {"bus": 1, "vm_pu": 1.0, "s_sc_max_mva": 5000.0, "rx_max": 0.1,
         "r0x0_max": 0.1, "x0x_max": 1.0}
    ],
    "line": [
        {"index": 0, "from_bus": 1, "to_bus": 5, "length_km": 50.0,
         "r_ohm_per_km": 0.0212, "x_ohm_per_km": 0.1162389, "c_nf_per_km": 230.0,
         "r0_ohm_per_km": 0.0848, "x0_ohm_per_km": 0.4649556, "c0_nf_per_km": 230.6,
         "max_i_ka": 0.963}
    ],
    "asymmetric_load": [
        {"bus": 5, "p_a_mw": 50.0, "q_a_mvar": 50.0, "p_b_mw": 10.0, "q_b_mvar": 15.0,
         "p_c_mw": 10.0, "q_c_mvar": 5.0}
    ]
}"#;

/// Meshed 110 kV network of four buses and five 1 km lines of four cable types.
pub const FOUR_BUS_110KV: &str = r#"{
    "sn_mva": 100.0,
    "bus": [
        {"index": 0, "vn_kv": 110.0, "name": "busn"},
        {"index": 1, "vn_kv": 110.0, "name": "busk"},
        {"index": 2, "vn_kv": 110.0, "name": "busm"},
        {"index": 3, "vn_kv": 110.0, "name": "busp"}
    ],
    "ext_grid": [
        {"bus": 0, "vm_pu": 1.0, "s_sc_max_mva": 5000.0, "rx_max": 0.1,
         "r0x0_max": 0.1, "x0x_max": 1.0, "name": "Grid Connection"}
    ],
    "line": [
        {"index": 0, "from_bus": 0, "to_bus": 2, "length_km": 1.0,
         "r_ohm_per_km": 0.0385, "x_ohm_per_km": 0.1319469, "c_nf_per_km": 170.0,
         "r0_ohm_per_km": 0.154, "x0_ohm_per_km": 0.5277876, "c0_nf_per_km": 170.4,
         "max_i_ka": 0.741},
        {"index": 1, "from_bus": 0, "to_bus": 3, "length_km": 1.0,
         "r_ohm_per_km": 0.0385, "x_ohm_per_km": 0.1319469, "c_nf_per_km": 170.0,
         "r0_ohm_per_km": 0.154, "x0_ohm_per_km": 0.5277876, "c0_nf_per_km": 170.4,
         "max_i_ka": 0.741},
        {"index": 2, "from_bus": 0, "to_bus": 1, "length_km": 1.0,
         "r_ohm_per_km": 0.0251, "x_ohm_per_km": 0.1225221, "c_nf_per_km": 210.0,
         "r0_ohm_per_km": 0.1005, "x0_ohm_per_km": 0.4900884, "c0_nf_per_km": 200.5,
         "max_i_ka": 0.89},
        {"index": 3, "from_bus": 1, "to_bus": 2, "length_km": 1.0,
         "r_ohm_per_km": 0.0212, "x_ohm_per_km": 0.1162389, "c_nf_per_km": 230.0,
         "r0_ohm_per_km": 0.0848, "x0_ohm_per_km": 0.4649556, "c0_nf_per_km": 230.6,
         "max_i_ka": 0.963},
        {"index": 4, "from_bus": 1, "to_bus": 3, "length_km": 1.0,
         "r_ohm_per_km": 0.0762, "x_ohm_per_km": 0.1507964, "c_nf_per_km": 140.0,
         "r0_ohm_per_km": 0.3048, "x0_ohm_per_km": 0.6031856, "c0_nf_per_km": 140.3,
         "max_i_ka": 0.531}
    ],
    "asymmetric_load": [
        {"bus": 1, "p_a_mw": 50.0, "q_a_mvar": 20.0, "p_b_mw": 80.0, "q_b_mvar": 60.0,
         "p_c_mw": 20.0, "q_c_mvar": 5.0},
        {"bus": 2, "p_a_mw": 50.0, "q_a_mvar": 50.0, "p_b_mw": 10.0, "q_b_mvar": 15.0,
         "p_c_mw": 10.0, "q_c_mvar": 5.0},
        {"bus": 3, "p_a_mw": 50.0, "q_a_mvar": 20.0, "p_b_mw": 60.0, "q_b_mvar": 20.0,
         "p_c_mw": 10.0, "q_c_mvar": 5.0}
    ]
}"#;

/// 0.4 kV cable of 400 m feeding a balanced and an unbalanced load.
pub const TWO_BUS_LV: &str = r#"{
    "sn_mva": 1.0,
    "bus": [
        {"index": 0, "vn_kv": 0.4},
        {"index": 1, "vn_kv": 0.4}
    ],
    "ext_grid": [
        {"bus": 0, "vm_pu": 1.0, "s_sc_max_mva": 10.0, "rx_max": 0.1,
         "r0x0_max": 0.1, "x0x_max": 1.0}
    ],
    "line": [
        {"index": 0, "from_bus": 0, "to_bus": 1, "length_km": 0.4,
         "r_ohm_per_km": 0.1013, "x_ohm_per_km": 0.06911504, "c_nf_per_km": 690.0,
         "g_us_per_km": 0.0,
         "r0_ohm_per_km": 0.4053, "x0_ohm_per_km": 0.2764602, "c0_nf_per_km": 312.4,
         "max_i_ka": 0.44}
    ],
    "load": [
        {"bus": 1, "p_mw": 0.01, "q_mvar": 0.01}
    ],
    "asymmetric_load": [
        {"bus": 1, "p_a_mw": 0.02, "q_a_mvar": 0.01, "p_b_mw": 0.015, "q_b_mvar": 0.005,
         "p_c_mw": 0.025, "q_c_mvar": 0.01}
    ]
}"#;

/// 0.4 kV network whose tables are not sorted and contain out-of-service entries.
pub const LV_UNSORTED: &str = r#"{
    "sn_mva": 1.0,
    "bus": [
        {"index": 4, "vn_kv": 0.4},
        {"index": 3, "vn_kv": 0.4, "in_service": false},
        {"index": 7, "vn_kv": 0.4}
    ],
    "ext_grid": [
        {"bus": 7, "vm_pu": 1.0, "s_sc_max_mva": 10.0, "rx_max": 0.1,
         "r0x0_max": 0.1, "x0x_max": 1.0}
    ],
    "line": [
        {"index": 4, "from_bus": 7, "to_bus": 4, "length_km": 1.0,
         "r_ohm_per_km": 0.1013, "x_ohm_per_km": 0.06911504, "c_nf_per_km": 690.0,
         "r0_ohm_per_km": 0.4053, "x0_ohm_per_km": 0.2764602, "c0_nf_per_km": 312.4,
         "max_i_ka": 0.44},
        {"index": 3, "from_bus": 7, "to_bus": 4, "length_km": 1.0, "in_service": false,
         "r_ohm_per_km": 0.1013, "x_ohm_per_km": 0.06911504, "c_nf_per_km": 690.0,
         "r0_ohm_per_km": 0.4053, "x0_ohm_per_km": 0.2764602, "c0_nf_per_km": 312.4,
         "max_i_ka": 0.44},
        {"index": 7, "from_bus": 7, "to_bus": 4, "length_km": 1.0,
         "r_ohm_per_km": 0.1013, "x_ohm_per_km": 0.06911504, "c_nf_per_km": 690.0,
         "r0_ohm_per_km": 0.4053, "x0_ohm_per_km": 0.2764602, "c0_nf_per_km": 312.4,
         "max_i_ka": 0.44}
    ],
    "load": [
        {"bus": 4, "p_mw": 0.03, "q_mvar": 0.03}
    ]
}"#;
