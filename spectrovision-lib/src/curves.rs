//! Weighting curves sampled at 1 nm.
//!
//! The photosynthetic curves cover 300..=800 nm, indexed by `nm - 300`.
//! The photopic curve covers 380..=780 nm, indexed by `nm - 380`.

pub const PHOTOSYNTHETIC_FIRST_NM: u32 = 300;
pub const PHOTOSYNTHETIC_LAST_NM: u32 = 800;
pub const PHOTOPIC_FIRST_NM: u32 = 380;
pub const PHOTOPIC_LAST_NM: u32 = 780;

/// Relative quantum efficiency (McCree).
pub const RQE: [f64; 501] = [
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.005, 0.01, 0.01,
    0.01, 0.01, 0.01, 0.01, 0.01, 0.01, 0.01, 0.015, 0.02, 0.025, 0.03, 0.035, 0.04, 0.045, 0.05,
    0.06, 0.07, 0.075, 0.08, 0.085, 0.09, 0.095, 0.1, 0.105, 0.11, 0.115, 0.12, 0.125, 0.13, 0.135,
    0.14, 0.15, 0.16, 0.17, 0.18, 0.19, 0.2, 0.21, 0.22, 0.235, 0.25, 0.26, 0.27, 0.285, 0.3, 0.315,
    0.33, 0.34, 0.35, 0.365, 0.38, 0.39, 0.4, 0.41, 0.42, 0.43, 0.44, 0.45, 0.46, 0.47, 0.48, 0.49,
    0.5, 0.51, 0.52, 0.53, 0.54, 0.545, 0.55, 0.56, 0.57, 0.58, 0.59, 0.595, 0.6, 0.61, 0.62, 0.625,
    0.63, 0.64, 0.65, 0.655, 0.66, 0.665, 0.67, 0.675, 0.68, 0.685, 0.69, 0.695, 0.7, 0.705, 0.71,
    0.715, 0.72, 0.725, 0.73, 0.735, 0.74, 0.74, 0.74, 0.745, 0.75, 0.75, 0.75, 0.755, 0.76, 0.76,
    0.76, 0.76, 0.76, 0.76, 0.76, 0.76, 0.76, 0.76, 0.76, 0.755, 0.75, 0.75, 0.75, 0.75, 0.75, 0.75,
    0.75, 0.75, 0.75, 0.75, 0.75, 0.75, 0.75, 0.75, 0.75, 0.75, 0.75, 0.745, 0.74, 0.74, 0.74,
    0.735, 0.73, 0.73, 0.73, 0.725, 0.72, 0.715, 0.71, 0.705, 0.7, 0.7, 0.7, 0.695, 0.69, 0.69,
    0.69, 0.685, 0.68, 0.68, 0.68, 0.68, 0.68, 0.685, 0.69, 0.69, 0.69, 0.69, 0.69, 0.69, 0.69,
    0.69, 0.69, 0.695, 0.7, 0.7, 0.7, 0.7, 0.7, 0.7, 0.7, 0.705, 0.71, 0.71, 0.71, 0.71, 0.71, 0.71,
    0.71, 0.715, 0.72, 0.72, 0.72, 0.72, 0.72, 0.72, 0.72, 0.725, 0.73, 0.73, 0.73, 0.73, 0.73,
    0.73, 0.73, 0.735, 0.74, 0.74, 0.74, 0.745, 0.75, 0.75, 0.75, 0.755, 0.76, 0.765, 0.77, 0.775,
    0.78, 0.79, 0.8, 0.805, 0.81, 0.815, 0.82, 0.825, 0.83, 0.835, 0.84, 0.845, 0.85, 0.855, 0.86,
    0.865, 0.87, 0.875, 0.88, 0.88, 0.88, 0.885, 0.89, 0.895, 0.9, 0.905, 0.91, 0.91, 0.91, 0.915,
    0.92, 0.925, 0.93, 0.93, 0.93, 0.935, 0.94, 0.94, 0.94, 0.945, 0.95, 0.95, 0.95, 0.955, 0.96,
    0.96, 0.96, 0.965, 0.97, 0.97, 0.97, 0.975, 0.98, 0.98, 0.98, 0.985, 0.99, 0.99, 0.99, 0.99,
    0.99, 0.995, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0,
    1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.995, 0.99, 0.99,
    0.99, 0.99, 0.99, 0.985, 0.98, 0.975, 0.97, 0.97, 0.97, 0.965, 0.96, 0.955, 0.95, 0.95, 0.95,
    0.95, 0.95, 0.945, 0.94, 0.94, 0.94, 0.94, 0.94, 0.935, 0.93, 0.93, 0.93, 0.93, 0.93, 0.93,
    0.93, 0.93, 0.93, 0.93, 0.93, 0.93, 0.93, 0.93, 0.93, 0.93, 0.93, 0.925, 0.92, 0.92, 0.92, 0.91,
    0.9, 0.89, 0.88, 0.86, 0.84, 0.82, 0.8, 0.78, 0.76, 0.735, 0.71, 0.685, 0.66, 0.635, 0.61, 0.59,
    0.57, 0.55, 0.53, 0.515, 0.5, 0.485, 0.47, 0.455, 0.44, 0.425, 0.41, 0.4, 0.39, 0.38, 0.37,
    0.355, 0.34, 0.33, 0.32, 0.315, 0.31, 0.3, 0.29, 0.28, 0.27, 0.26, 0.25, 0.245, 0.24, 0.23,
    0.22, 0.215, 0.21, 0.2, 0.19, 0.185, 0.18, 0.17, 0.16, 0.15, 0.14, 0.135, 0.13, 0.125, 0.12,
    0.11, 0.1, 0.095, 0.09, 0.085, 0.08, 0.075, 0.07, 0.065, 0.06, 0.06, 0.06, 0.05, 0.04, 0.04,
    0.04, 0.035, 0.03, 0.03, 0.03, 0.03, 0.03, 0.03, 0.03, 0.025, 0.02, 0.02, 0.02, 0.02, 0.02,
    0.02, 0.02, 0.015, 0.01, 0.01, 0.01, 0.01, 0.01, 0.01, 0.01, 0.01, 0.01, 0.01, 0.01, 0.01, 0.01,
    0.005, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
];

/// Phytochrome red-absorbing form, Pr.
pub const SIGMA_R: [f64; 501] = [
    2233.0, 2035.5, 1838.0, 1747.0, 1656.0, 1577.5, 1499.0, 1455.5, 1412.0, 1353.0, 1294.0, 1257.5,
    1221.0, 1174.0, 1127.0, 1078.0, 1029.0, 991.0, 953.0, 923.0, 893.0, 863.5, 834.0, 800.5, 767.0,
    757.0, 747.0, 736.5, 726.0, 719.5, 713.0, 713.0, 713.0, 719.0, 725.0, 738.0, 751.0, 765.5,
    780.0, 795.5, 811.0, 826.0, 841.0, 860.0, 879.0, 915.5, 952.0, 970.5, 989.0, 1018.5, 1048.0,
    1086.0, 1124.0, 1157.0, 1190.0, 1226.5, 1263.0, 1294.5, 1326.0, 1357.5, 1389.0, 1412.5, 1436.0,
    1452.0, 1468.0, 1476.0, 1484.0, 1500.5, 1517.0, 1523.0, 1529.0, 1534.5, 1540.0, 1542.5, 1545.0,
    1561.0, 1577.0, 1577.0, 1577.0, 1581.5, 1586.0, 1579.0, 1572.0, 1564.5, 1557.0, 1531.0, 1505.0,
    1484.5, 1464.0, 1422.5, 1381.0, 1337.5, 1294.0, 1254.5, 1215.0, 1156.0, 1097.0, 1050.5, 1004.0,
    954.0, 904.0, 857.0, 810.0, 771.5, 733.0, 700.5, 668.0, 636.0, 604.0, 582.5, 561.0, 540.0,
    519.0, 495.0, 471.0, 449.0, 427.0, 417.5, 408.0, 387.0, 366.0, 357.0, 348.0, 334.0, 320.0,
    314.0, 308.0, 300.0, 292.0, 283.0, 274.0, 268.5, 263.0, 253.5, 244.0, 244.0, 244.0, 237.0,
    230.0, 230.0, 230.0, 219.5, 209.0, 202.5, 196.0, 190.0, 184.0, 178.0, 172.0, 167.0, 162.0,
    162.0, 162.0, 156.0, 150.0, 146.5, 143.0, 135.5, 128.0, 128.0, 128.0, 123.5, 119.0, 119.0,
    119.0, 113.0, 107.0, 107.0, 107.0, 104.0, 101.0, 101.0, 101.0, 96.95, 92.9, 92.9, 92.9, 88.75,
    84.6, 84.6, 84.6, 84.6, 84.6, 79.7, 74.8, 74.8, 74.8, 74.8, 74.8, 74.8, 74.8, 71.75, 68.7, 68.7,
    68.7, 68.7, 68.7, 68.7, 68.7, 68.7, 68.7, 72.85, 77.0, 77.0, 77.0, 77.0, 77.0, 77.0, 77.0, 77.0,
    77.0, 77.0, 77.0, 82.7, 88.4, 91.05, 93.7, 101.85, 110.0, 110.0, 110.0, 109.5, 109.0, 115.5,
    122.0, 126.0, 130.0, 130.0, 130.0, 133.5, 137.0, 145.0, 153.0, 160.5, 168.0, 168.0, 168.0,
    177.0, 186.0, 194.0, 202.0, 211.5, 221.0, 230.0, 239.0, 245.5, 252.0, 261.0, 270.0, 287.0,
    304.0, 307.5, 311.0, 327.0, 343.0, 356.0, 369.0, 386.0, 403.0, 412.0, 421.0, 428.0, 435.0,
    451.5, 468.0, 486.0, 504.0, 513.5, 523.0, 541.5, 560.0, 577.5, 595.0, 617.5, 640.0, 659.5,
    679.0, 707.0, 735.0, 762.0, 789.0, 816.5, 844.0, 876.0, 908.0, 937.5, 967.0, 1009.5, 1052.0,
    1087.0, 1122.0, 1161.5, 1201.0, 1252.5, 1304.0, 1342.5, 1381.0, 1429.0, 1477.0, 1526.5, 1576.0,
    1620.5, 1665.0, 1705.0, 1745.0, 1780.0, 1815.0, 1854.5, 1894.0, 1922.0, 1950.0, 1982.5, 2015.0,
    2039.0, 2063.0, 2083.5, 2104.0, 2122.5, 2141.0, 2162.5, 2184.0, 2215.5, 2247.0, 2275.0, 2303.0,
    2332.0, 2361.0, 2407.5, 2454.0, 2497.0, 2540.0, 2598.5, 2657.0, 2730.0, 2803.0, 2860.0, 2917.0,
    2993.5, 3070.0, 3145.0, 3220.0, 3319.0, 3418.0, 3515.5, 3613.0, 3702.0, 3791.0, 3886.5, 3982.0,
    4112.0, 4242.0, 4343.0, 4444.0, 4534.0, 4624.0, 4755.5, 4887.0, 4988.0, 5089.0, 5169.5, 5250.0,
    5333.5, 5417.0, 5476.0, 5535.0, 5568.0, 5601.0, 5591.5, 5582.0, 5550.5, 5519.0, 5420.5, 5322.0,
    5218.5, 5115.0, 4939.5, 4764.0, 4571.0, 4378.0, 4215.0, 4052.0, 3823.0, 3594.0, 3356.5, 3119.0,
    2904.0, 2689.0, 2498.0, 2307.0, 2106.5, 1906.0, 1734.5, 1563.0, 1419.5, 1276.0, 1145.0, 1014.0,
    911.5, 809.0, 729.0, 649.0, 588.0, 527.0, 477.0, 427.0, 379.0, 331.0, 304.0, 277.0, 256.5,
    236.0, 211.5, 187.0, 178.0, 169.0, 158.0, 147.0, 141.0, 135.0, 126.0, 117.0, 110.0, 103.0,
    103.0, 103.0, 97.55, 92.1, 92.1, 92.1, 86.45, 80.8, 80.8, 80.8, 77.05, 73.3, 73.3, 73.3, 73.3,
    73.3, 73.3, 73.3, 73.3, 73.3, 73.3, 73.3, 73.3, 73.3, 67.6, 61.9, 61.9, 61.9, 61.9, 61.9, 61.9,
    61.9, 61.9, 61.9, 61.9, 61.9, 61.9, 61.9, 61.9, 61.9, 61.9, 61.9, 61.9, 61.9, 61.9, 61.9, 55.85,
    49.8, 49.8, 49.8, 49.8, 49.8, 49.8, 49.8, 49.8, 49.8, 49.8, 49.8, 49.8, 49.8, 49.8, 49.8, 49.8,
    49.8, 49.8, 49.8, 49.8, 49.8, 49.8, 49.8, 49.8, 49.8, 49.8, 49.8, 49.8, 49.8, 49.8, 49.8,
];

/// Phytochrome far-red-absorbing form, Pfr.
pub const SIGMA_FR: [f64; 501] = [
    920.0, 852.0, 784.0, 745.0, 706.0, 687.0, 668.0, 656.5, 645.0, 627.5, 610.0, 604.5, 599.0,
    584.0, 569.0, 551.5, 534.0, 519.5, 505.0, 486.5, 468.0, 450.0, 432.0, 412.5, 393.0, 381.0,
    369.0, 354.5, 340.0, 329.5, 319.0, 313.5, 308.0, 296.5, 285.0, 283.0, 281.0, 273.5, 266.0,
    262.5, 259.0, 258.0, 257.0, 256.0, 255.0, 253.5, 252.0, 254.5, 257.0, 259.0, 261.0, 266.0,
    271.0, 272.5, 274.0, 278.0, 282.0, 286.5, 291.0, 296.0, 301.0, 306.5, 312.0, 319.0, 326.0,
    330.5, 335.0, 342.0, 349.0, 357.0, 365.0, 373.0, 381.0, 389.0, 397.0, 404.0, 411.0, 418.5,
    426.0, 434.0, 442.0, 446.5, 451.0, 457.5, 464.0, 474.5, 485.0, 490.5, 496.0, 503.5, 511.0,
    517.5, 524.0, 529.0, 534.0, 537.0, 540.0, 546.5, 553.0, 556.0, 559.0, 561.0, 563.0, 565.5,
    568.0, 569.5, 571.0, 572.0, 573.0, 571.5, 570.0, 567.0, 564.0, 560.5, 557.0, 550.0, 543.0,
    535.5, 528.0, 517.5, 507.0, 498.0, 489.0, 471.5, 454.0, 442.5, 431.0, 416.0, 401.0, 389.0,
    377.0, 365.0, 353.0, 339.0, 325.0, 312.5, 300.0, 286.5, 273.0, 267.0, 261.0, 247.0, 233.0,
    225.0, 217.0, 209.5, 202.0, 194.0, 186.0, 177.5, 169.0, 162.0, 155.0, 149.5, 144.0, 138.0,
    132.0, 129.0, 126.0, 119.0, 112.0, 109.0, 106.0, 102.55, 99.1, 96.1, 93.1, 90.4, 87.7, 84.8,
    81.9, 78.8, 75.7, 73.95, 72.2, 72.0, 71.8, 67.15, 62.5, 60.15, 57.8, 55.45, 53.1, 51.35, 49.6,
    49.6, 49.6, 49.6, 49.6, 47.25, 44.9, 45.05, 45.2, 43.4, 41.6, 41.6, 41.6, 39.25, 36.9, 36.9,
    36.9, 36.7, 36.5, 37.05, 37.6, 35.25, 32.9, 32.9, 32.9, 32.9, 32.9, 32.9, 32.9, 33.1, 33.3,
    30.3, 27.3, 26.85, 26.4, 26.4, 26.4, 26.35, 26.3, 28.6, 30.9, 30.65, 30.4, 30.4, 30.4, 30.2,
    30.0, 29.6, 29.2, 28.8, 28.4, 28.4, 28.4, 30.65, 32.9, 32.5, 32.1, 32.7, 33.3, 32.8, 32.3,
    33.75, 35.2, 34.75, 34.3, 36.8, 39.3, 39.15, 39.0, 38.15, 37.3, 40.6, 43.9, 43.0, 42.1, 43.95,
    45.8, 45.45, 45.1, 47.5, 49.9, 52.75, 55.6, 55.1, 54.6, 57.95, 61.3, 60.4, 59.5, 62.65, 65.8,
    67.65, 69.5, 71.3, 73.1, 74.9, 76.7, 78.7, 80.7, 82.45, 84.2, 88.6, 93.0, 94.05, 95.1, 97.4,
    99.7, 104.85, 110.0, 115.5, 121.0, 122.5, 124.0, 130.0, 136.0, 141.0, 146.0, 147.0, 148.0,
    152.5, 157.0, 159.0, 161.0, 166.0, 171.0, 175.0, 179.0, 185.5, 192.0, 195.5, 199.0, 205.5,
    212.0, 215.0, 218.0, 225.0, 232.0, 238.0, 244.0, 250.5, 257.0, 263.0, 269.0, 275.5, 282.0,
    291.5, 301.0, 311.0, 321.0, 327.0, 333.0, 342.5, 352.0, 364.0, 376.0, 386.0, 396.0, 406.0,
    416.0, 427.5, 439.0, 449.5, 460.0, 472.5, 485.0, 497.5, 510.0, 520.5, 531.0, 544.5, 558.0,
    572.5, 587.0, 599.0, 611.0, 622.5, 634.0, 647.0, 660.0, 670.0, 680.0, 692.5, 705.0, 714.5,
    724.0, 732.0, 740.0, 747.0, 754.0, 759.5, 765.0, 774.5, 784.0, 791.0, 798.0, 803.5, 809.0,
    817.5, 826.0, 834.0, 842.0, 849.5, 857.0, 867.5, 878.0, 888.5, 899.0, 908.0, 917.0, 929.5,
    942.0, 953.5, 965.0, 979.5, 994.0, 1010.5, 1027.0, 1040.5, 1054.0, 1071.5, 1089.0, 1107.0,
    1125.0, 1138.0, 1151.0, 1173.0, 1195.0, 1213.5, 1232.0, 1250.0, 1268.0, 1283.0, 1298.0, 1317.5,
    1337.0, 1355.5, 1374.0, 1389.5, 1405.0, 1421.5, 1438.0, 1448.5, 1459.0, 1471.0, 1483.0, 1492.5,
    1502.0, 1505.0, 1508.0, 1510.5, 1513.0, 1509.0, 1505.0, 1496.5, 1488.0, 1477.5, 1467.0, 1451.0,
    1435.0, 1414.5, 1394.0, 1366.0, 1338.0, 1309.5, 1281.0, 1245.0, 1209.0, 1170.5, 1132.0, 1094.0,
    1056.0, 1019.5, 983.0, 943.0, 903.0, 871.0, 839.0, 788.5, 738.0, 707.5, 677.0, 646.5, 616.0,
    577.5, 539.0, 507.0, 475.0, 448.5, 422.0, 394.5, 367.0, 344.5, 322.0, 304.5, 287.0, 267.5,
    248.0, 236.0, 224.0, 210.0, 196.0, 186.5, 177.0, 165.0, 153.0, 145.5, 138.0, 134.0, 130.0,
    123.5, 117.0, 109.5, 102.0, 97.1, 92.2, 92.2, 92.2,
];

/// CIE 1931 photopic luminosity function.
pub const CIE_1931: [f64; 401] = [
    3.9e-05, 4.28264e-05, 4.69146e-05, 5.15896e-05, 5.71764e-05, 6.4e-05, 7.234421e-05,
    8.221224e-05, 9.350816e-05, 0.0001061361, 0.00012, 0.000134984, 0.000151492, 0.000170208,
    0.000191816, 0.000217, 0.0002469067, 0.00028124, 0.00031852, 0.0003572667, 0.000396,
    0.0004337147, 0.000473024, 0.000517876, 0.0005722187, 0.00064, 0.00072456, 0.0008255,
    0.00094116, 0.00106988, 0.00121, 0.001362091, 0.001530752, 0.001720368, 0.001935323, 0.00218,
    0.0024548, 0.002764, 0.0031178, 0.0035264, 0.004, 0.00454624, 0.00515932, 0.00582928,
    0.00654616, 0.0073, 0.008086507, 0.00890872, 0.00976768, 0.01066443, 0.0116, 0.01257317,
    0.01358272, 0.01462968, 0.01571509, 0.01684, 0.01800736, 0.01921448, 0.02045392, 0.02171824,
    0.023, 0.02429461, 0.02561024, 0.02695857, 0.02835125, 0.0298, 0.03131083, 0.03288368,
    0.03452112, 0.03622571, 0.038, 0.03984667, 0.041768, 0.043766, 0.04584267, 0.048, 0.05024368,
    0.05257304, 0.05498056, 0.05745872, 0.06, 0.06260197, 0.06527752, 0.06804208, 0.07091109,
    0.0739, 0.077016, 0.0802664, 0.0836668, 0.0872328, 0.09098, 0.09491755, 0.09904584, 0.1033674,
    0.1078846, 0.1126, 0.117532, 0.1226744, 0.1279928, 0.1334528, 0.13902, 0.1446764, 0.1504693,
    0.1564619, 0.1627177, 0.1693, 0.1762431, 0.1835581, 0.1912735, 0.199418, 0.20802, 0.2171199,
    0.2267345, 0.2368571, 0.2474812, 0.2586, 0.2701849, 0.2822939, 0.2950505, 0.308578, 0.323,
    0.3384021, 0.3546858, 0.3716986, 0.3892875, 0.4073, 0.4256299, 0.4443096, 0.4633944, 0.4829395,
    0.503, 0.5235693, 0.544512, 0.56569, 0.5869653, 0.6082, 0.6293456, 0.6503068, 0.6708752,
    0.6908424, 0.71, 0.7281852, 0.7454636, 0.7619694, 0.7778368, 0.7932, 0.8081104, 0.8224962,
    0.8363068, 0.8494916, 0.862, 0.8738108, 0.8849624, 0.8954936, 0.9054432, 0.9148501, 0.9237348,
    0.9320924, 0.9399226, 0.9472252, 0.954, 0.9602561, 0.9660074, 0.9712606, 0.9760225, 0.9803,
    0.9840924, 0.9874182, 0.9903128, 0.9928116, 0.9949501, 0.9967108, 0.9980983, 0.999112,
    0.9997482, 1.0, 0.9998567, 0.9993046, 0.9983255, 0.9968987, 0.995, 0.9926005, 0.9897426,
    0.9864444, 0.9827241, 0.9786, 0.9740837, 0.9691712, 0.9638568, 0.9581349, 0.952, 0.9454504,
    0.9384992, 0.9311628, 0.9234576, 0.9154, 0.9070064, 0.8982772, 0.8892048, 0.8797816, 0.87,
    0.8598613, 0.849392, 0.838622, 0.8275813, 0.8163, 0.8047947, 0.793082, 0.781192, 0.7691547,
    0.757, 0.7447541, 0.7324224, 0.7200036, 0.7074965, 0.6949, 0.6822192, 0.6694716, 0.6566744,
    0.6438448, 0.631, 0.6181555, 0.6053144, 0.5924756, 0.5796379, 0.5668, 0.5539611, 0.5411372,
    0.5283528, 0.5156323, 0.503, 0.4904688, 0.4780304, 0.4656776, 0.4534032, 0.4412, 0.42908,
    0.417036, 0.405032, 0.393032, 0.381, 0.3689184, 0.3568272, 0.3447768, 0.3328176, 0.321,
    0.3093381, 0.2978504, 0.2865936, 0.2756245, 0.265, 0.2547632, 0.2448896, 0.2353344, 0.2260528,
    0.217, 0.2081616, 0.1995488, 0.1911552, 0.1829744, 0.175, 0.1672235, 0.1596464, 0.1522776,
    0.1451259, 0.1382, 0.1315003, 0.1250248, 0.1187792, 0.1127691, 0.107, 0.1014762, 0.09618864,
    0.09112296, 0.08626485, 0.0816, 0.07712064, 0.07282552, 0.06871008, 0.06476976, 0.061,
    0.05739621, 0.05395504, 0.05067376, 0.04754965, 0.04458, 0.04175872, 0.03908496, 0.03656384,
    0.03420048, 0.032, 0.02996261, 0.02807664, 0.02632936, 0.02470805, 0.0232, 0.02180077,
    0.02050112, 0.01928108, 0.01812069, 0.017, 0.01590379, 0.01483718, 0.01381068, 0.01283478,
    0.01192, 0.01106831, 0.01027339, 0.009533311, 0.008846157, 0.00821, 0.007623781, 0.007085424,
    0.006591476, 0.006138485, 0.005723, 0.005343059, 0.004995796, 0.004676404, 0.004380075,
    0.004102, 0.003838453, 0.003589099, 0.003354219, 0.003134093, 0.002929, 0.002738139,
    0.002559876, 0.002393244, 0.002237275, 0.002091, 0.001953587, 0.00182458, 0.00170358,
    0.001590187, 0.001484, 0.001384496, 0.001291268, 0.001204092, 0.001122744, 0.001047,
    0.0009765896, 0.0009111088, 0.0008501332, 0.0007932384, 0.00074, 0.0006900827, 0.00064331,
    0.000599496, 0.0005584547, 0.00052, 0.0004839136, 0.0004500528, 0.0004183452, 0.0003887184,
    0.0003611, 0.0003353835, 0.0003114404, 0.0002891656, 0.0002684539, 0.0002492, 0.0002313019,
    0.0002146856, 0.0001992884, 0.0001850475, 0.0001719, 0.0001597781, 0.0001486044, 0.0001383016,
    0.0001287925, 0.00012, 0.0001118595, 0.0001043224, 9.73356e-05, 9.084587e-05, 8.48e-05,
    7.914667e-05, 7.3858e-05, 6.8916e-05, 6.430267e-05, 6e-05, 5.598187e-05, 5.22256e-05,
    4.87184e-05, 4.544747e-05, 4.24e-05, 3.956104e-05, 3.691512e-05, 3.444868e-05, 3.214816e-05,
    3e-05, 2.799125e-05, 2.611356e-05, 2.436024e-05, 2.272461e-05, 2.12e-05, 1.977855e-05,
    1.845285e-05, 1.721687e-05, 1.606459e-05, 1.499e-05,
];

fn sample(table: &[f64], first: u32, nm: u32) -> f64 {
    nm.checked_sub(first)
        .and_then(|i| table.get(i as usize))
        .copied()
        .unwrap_or(0.0)
}

/// RQE at `nm`, zero outside 300..=800.
pub fn rqe(nm: u32) -> f64 {
    sample(&RQE, PHOTOSYNTHETIC_FIRST_NM, nm)
}

pub fn sigma_r(nm: u32) -> f64 {
    sample(&SIGMA_R, PHOTOSYNTHETIC_FIRST_NM, nm)
}

pub fn sigma_fr(nm: u32) -> f64 {
    sample(&SIGMA_FR, PHOTOSYNTHETIC_FIRST_NM, nm)
}

/// Photopic weight at `nm`, zero outside 380..=780.
pub fn photopic(nm: u32) -> f64 {
    sample(&CIE_1931, PHOTOPIC_FIRST_NM, nm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_span_their_ranges() {
        assert_eq!(RQE.len() as u32, PHOTOSYNTHETIC_LAST_NM - PHOTOSYNTHETIC_FIRST_NM + 1);
        assert_eq!(SIGMA_R.len(), RQE.len());
        assert_eq!(SIGMA_FR.len(), RQE.len());
        assert_eq!(CIE_1931.len() as u32, PHOTOPIC_LAST_NM - PHOTOPIC_FIRST_NM + 1);
    }

    #[test]
    fn lookups_outside_range_are_zero() {
        assert_eq!(rqe(299), 0.0);
        assert_eq!(rqe(801), 0.0);
        assert_eq!(photopic(379), 0.0);
        assert_eq!(photopic(781), 0.0);
        assert_eq!(sigma_r(300), 2233.0);
        assert_eq!(photopic(380), 0.000039);
    }

    #[test]
    fn photopic_peaks_near_555() {
        let peak = (PHOTOPIC_FIRST_NM..=PHOTOPIC_LAST_NM)
            .max_by(|a, b| photopic(*a).total_cmp(&photopic(*b)))
            .unwrap();
        assert!((550..=560).contains(&peak), "peak at {}", peak);
    }
}
